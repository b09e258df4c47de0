//! Daemon context and event loop
//!
//! Key releases trigger single-key bindings only when the released key was the
//! last one held. Every press that leaves more than one key held re-checks the
//! held set against the multi-key bindings.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{error, info, warn};

use crate::bindings::BindingStore;
use crate::combo::ComboTracker;
use crate::config::{self, RetryPolicy, RunMode, Settings};
use crate::dispatch::{Dispatcher, Launcher, ProcessLauncher, Trigger};
use crate::error::DaemonError;
use crate::input::{EvdevSource, KeyEvent, KeySource, KeyState};
use crate::signals;

/// Consumer of key events driven by [`run_event_loop`]
pub trait KeyHandler {
    fn on_key(&mut self, event: KeyEvent);

    /// Called after every read, including empty ones
    fn on_tick(&mut self) {}
}

/// Everything the daemon owns for its lifetime
pub struct Daemon<L> {
    bindings: BindingStore,
    tracker: ComboTracker,
    dispatcher: Dispatcher<L>,
}

impl<L: Launcher> Daemon<L> {
    pub fn new(bindings: BindingStore, max_combo: usize, launcher: L) -> Self {
        Self {
            bindings,
            tracker: ComboTracker::new(max_combo),
            dispatcher: Dispatcher::new(launcher),
        }
    }

    /// Apply one key transition, returning what fired
    pub fn handle_key(&mut self, event: KeyEvent) -> Option<Trigger> {
        match event.state {
            KeyState::Released => {
                self.tracker.remove(event.code);
                if !self.tracker.is_empty() {
                    return None;
                }
                self.dispatcher
                    .single(&self.bindings, event.code)
                    .map(|_| Trigger::Single)
            }
            KeyState::Pressed => {
                self.tracker.insert(event.code);
                if self.tracker.len() < 2 {
                    return None;
                }
                self.dispatcher
                    .combo(&self.bindings, self.tracker.held())
                    .map(|_| Trigger::MultiKey)
            }
        }
    }
}

impl<L: Launcher> KeyHandler for Daemon<L> {
    fn on_key(&mut self, event: KeyEvent) {
        self.handle_key(event);
    }

    fn on_tick(&mut self) {
        self.dispatcher.reap();
    }
}

impl<L> Drop for Daemon<L> {
    fn drop(&mut self) {
        info!(bindings = self.bindings.len(), "Releasing keybinds");
    }
}

/// Keycode check mode: report presses, launch nothing
#[derive(Debug, Default)]
pub struct KeycodePrinter;

impl KeyHandler for KeycodePrinter {
    fn on_key(&mut self, event: KeyEvent) {
        if event.state == KeyState::Pressed {
            info!(keycode = event.code, "Key pressed");
        }
    }
}

/// Read events until shutdown is requested or the device keeps failing
pub fn run_event_loop<S, H>(
    source: &mut S,
    shutdown: &AtomicBool,
    retry: RetryPolicy,
    handler: &mut H,
) -> Result<(), DaemonError>
where
    S: KeySource,
    H: KeyHandler,
{
    let mut failures: u32 = 0;

    while !shutdown.load(Ordering::Relaxed) {
        match source.read_keys() {
            Ok(events) => {
                failures = 0;
                for event in events {
                    handler.on_key(event);
                }
            }
            Err(e) => {
                if failures == retry.max_failures {
                    error!(failures = failures + 1, "Input device read failed! Aborting");
                    return Err(DaemonError::DeviceRead {
                        attempts: failures + 1,
                        source: e,
                    });
                }
                warn!(
                    error = %e,
                    attempt = failures + 1,
                    "Input device read failed! Ignoring and waiting"
                );
                thread::sleep(retry.pause);
                failures += 1;
            }
        }
        handler.on_tick();
    }

    info!("Interrupt caught! Shutting down gracefully...");
    Ok(())
}

/// Open the device, load bindings and run until interrupted
pub fn run(settings: &Settings) -> Result<(), DaemonError> {
    let mut source = EvdevSource::open(&settings.device)?;
    let shutdown = signals::shutdown_flag().map_err(DaemonError::Signals)?;

    match settings.mode {
        RunMode::Daemon => {
            let bindings = config::load_bindings(&settings.config_path, settings.max_combo)?;
            let mut daemon = Daemon::new(bindings, settings.max_combo, ProcessLauncher::default());
            info!("Started! Interrupt to exit.");
            run_event_loop(&mut source, &shutdown, settings.retry, &mut daemon)
        }
        RunMode::ShowKeycodes => {
            info!("Press keys to see their keycodes. Interrupt to exit.");
            run_event_loop(&mut source, &shutdown, settings.retry, &mut KeycodePrinter)
        }
    }
}
