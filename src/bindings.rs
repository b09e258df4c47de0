//! Binding store
//!
//! Holds every key combination loaded from the binding file, in file order.
//! The store is filled once at startup and only read afterwards.

use std::ffi::OsString;
use std::fmt;

use crate::config::ConfigError;

/// Physical key identifier as reported by the input device
pub type Keycode = u32;

/// A key combination and the command it launches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    keys: Vec<Keycode>,
    argv: Vec<OsString>,
}

impl Binding {
    /// Build a binding, normalizing `keys` to ascending unique order.
    ///
    /// Returns `None` when either side is empty.
    pub fn new(mut keys: Vec<Keycode>, argv: Vec<OsString>) -> Option<Self> {
        if keys.is_empty() || argv.is_empty() || argv.iter().any(|arg| arg.is_empty()) {
            return None;
        }
        keys.sort_unstable();
        keys.dedup();
        Some(Self { keys, argv })
    }

    pub fn keys(&self) -> &[Keycode] {
        &self.keys
    }

    /// Program followed by its arguments
    pub fn argv(&self) -> &[OsString] {
        &self.argv
    }

    pub fn is_single(&self) -> bool {
        self.keys.len() == 1
    }

    /// Argument vector rendered as quoted words, for logging
    pub fn command_display(&self) -> String {
        self.argv
            .iter()
            .map(|arg| format!("\"{}\"", arg.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self
            .keys
            .iter()
            .map(Keycode::to_string)
            .collect::<Vec<_>>()
            .join(";");
        write!(f, "{keys} -> {}", self.command_display())
    }
}

/// Ordered list of bindings; the first match in file order wins
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BindingStore {
    bindings: Vec<Binding>,
}

impl BindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a binding, reporting allocation failure instead of aborting
    pub fn push(&mut self, binding: Binding) -> Result<(), ConfigError> {
        self.bindings
            .try_reserve(1)
            .map_err(|_| ConfigError::OutOfMemory)?;
        self.bindings.push(binding);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    /// First single-key binding for `code`
    pub fn find_single(&self, code: Keycode) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|binding| binding.is_single() && binding.keys[0] == code)
    }

    /// First binding whose key set equals `held` exactly (both ascending)
    pub fn find_combo(&self, held: &[Keycode]) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|binding| binding.keys.as_slice() == held)
    }
}
