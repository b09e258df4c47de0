//! Held-key tracking
//!
//! Keeps the keys currently held down as an ascending, duplicate-free set so
//! it can be compared directly against a binding's key list.

use tracing::{debug, info};

use crate::bindings::Keycode;

/// Result of a key press on the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Key already held (e.g. a repeat that slipped through)
    Duplicate,
    /// Capacity reached; the press was dropped
    Full,
}

/// Bounded sorted set of held keycodes
#[derive(Debug, Clone)]
pub struct ComboTracker {
    held: Vec<Keycode>,
    capacity: usize,
}

impl ComboTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            held: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn insert(&mut self, code: Keycode) -> InsertOutcome {
        if self.held.len() == self.capacity {
            info!(
                keycode = code,
                capacity = self.capacity,
                "Too many keys at the same time! Ignoring latest key"
            );
            return InsertOutcome::Full;
        }
        match self.held.binary_search(&code) {
            Ok(_) => {
                debug!(keycode = code, "Ignoring key (already in combo buffer)");
                InsertOutcome::Duplicate
            }
            Err(pos) => {
                self.held.insert(pos, code);
                InsertOutcome::Inserted
            }
        }
    }

    /// Returns false when the key was not held; it may have been dropped by a full buffer
    pub fn remove(&mut self, code: Keycode) -> bool {
        match self.held.binary_search(&code) {
            Ok(pos) => {
                self.held.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn held(&self) -> &[Keycode] {
        &self.held
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}
