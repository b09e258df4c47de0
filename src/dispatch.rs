//! Matching held keys against bindings and launching commands

use std::ffi::OsString;
use std::process::{Child, Command, Stdio};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bindings::{Binding, BindingStore, Keycode};

/// The child process could not be started
#[derive(Debug, Error)]
#[error("could not create child process for {program:?}: {source}")]
pub struct SpawnError {
    pub program: OsString,
    #[source]
    pub source: std::io::Error,
}

/// Starts a command without waiting for it
pub trait Launcher {
    fn launch(&mut self, argv: &[OsString]) -> Result<(), SpawnError>;

    /// Collect children that have exited, without blocking
    fn reap(&mut self) {}
}

/// Launches real processes; `argv[0]` is looked up on PATH, no shell involved.
///
/// Children are never waited on. The event loop calls [`Launcher::reap`]
/// between reads so finished children do not linger as zombies.
#[derive(Debug, Default)]
pub struct ProcessLauncher {
    children: Vec<Child>,
}

impl Launcher for ProcessLauncher {
    fn launch(&mut self, argv: &[OsString]) -> Result<(), SpawnError> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(());
        };
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| SpawnError {
                program: program.clone(),
                source,
            })?;
        debug!(pid = child.id(), "Spawned child process");
        self.children.push(child);
        Ok(())
    }

    fn reap(&mut self) {
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                debug!(pid = child.id(), %status, "Child process exited");
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(pid = child.id(), error = %e, "Could not poll child process");
                false
            }
        });
    }
}

/// Which rule fired a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A key released while nothing else was held
    Single,
    /// Every key of the binding held at once
    MultiKey,
}

/// Looks up bindings and hands their argv to a [`Launcher`]
#[derive(Debug)]
pub struct Dispatcher<L> {
    launcher: L,
}

impl<L: Launcher> Dispatcher<L> {
    pub fn new(launcher: L) -> Self {
        Self { launcher }
    }

    /// Released key was the last one held
    pub fn single<'s>(&mut self, store: &'s BindingStore, code: Keycode) -> Option<&'s Binding> {
        let binding = store.find_single(code)?;
        self.fire(Trigger::Single, binding);
        Some(binding)
    }

    /// More than one key held; `held` must be ascending
    pub fn combo<'s>(&mut self, store: &'s BindingStore, held: &[Keycode]) -> Option<&'s Binding> {
        let binding = store.find_combo(held)?;
        self.fire(Trigger::MultiKey, binding);
        Some(binding)
    }

    fn fire(&mut self, trigger: Trigger, binding: &Binding) {
        let argv = binding.command_display();
        match trigger {
            Trigger::Single => info!(keys = ?binding.keys(), %argv, "Single bind triggered"),
            Trigger::MultiKey => {
                info!(keys = ?binding.keys(), %argv, "Multi-key bind triggered")
            }
        }
        if let Err(e) = self.launcher.launch(binding.argv()) {
            warn!(error = %e, "Could not create child process, ignoring");
        }
    }

    pub fn reap(&mut self) {
        self.launcher.reap();
    }

    #[cfg(test)]
    pub fn launcher(&self) -> &L {
        &self.launcher
    }
}
