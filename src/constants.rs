//! Application-wide constants
//!
//! Magic numbers and string literals used by the daemon, kept in one place.

/// Input event constants (from evdev)
pub mod input {
    /// Key press event value
    pub const KEY_PRESS: i32 = 1;

    /// Key release event value
    pub const KEY_RELEASE: i32 = 0;

    /// Key repeat event value
    pub const KEY_REPEAT: i32 = 2;

    /// How long a single device poll may block before the shutdown flag is rechecked
    pub const POLL_TIMEOUT_MS: u16 = 250;
}

/// Filesystem locations
pub mod paths {
    /// Directory scanned for input devices
    pub const DEV_INPUT: &str = "/dev/input";

    /// Binding file name, relative to the home directory
    pub const CONFIG_FILENAME: &str = ".babybindsrc";
}

/// Binding file grammar limits
pub mod grammar {
    /// Longest accepted keycode field (value <= 9,999,999)
    pub const MAX_KEYCODE_DIGITS: usize = 7;

    /// Initial capacity of the command accumulation buffer
    pub const INITIAL_BUFFER_SIZE: usize = 64;
}

/// Combo tracking
pub mod combo {
    /// Keys that may be held at once, and keycodes allowed in one binding
    pub const DEFAULT_MAX_COMBO: usize = 5;
}

/// Device read retry policy
pub mod retry {
    use std::time::Duration;

    /// Consecutive failed reads tolerated before giving up
    pub const MAX_READ_FAILURES: u32 = 10;

    /// Pause between failed reads
    pub const READ_FAILURE_PAUSE: Duration = Duration::from_secs(3);
}

/// Permission hints shown when /dev/input is not accessible
pub mod permissions {
    /// Group granting read access to evdev nodes
    pub const INPUT_GROUP: &str = "input";

    /// Command to add the current user to the input group
    pub const ADD_TO_INPUT_GROUP: &str = "sudo usermod -aG input $USER";
}
