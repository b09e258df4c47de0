use evdev::{Device, EventType};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use std::io;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use tracing::{error, info, trace, warn};

use crate::bindings::Keycode;
use crate::constants::{input, paths, permissions};
use crate::error::DaemonError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// A genuine key transition; auto-repeats never become a `KeyEvent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: Keycode,
    pub state: KeyState,
}

impl KeyEvent {
    pub fn pressed(code: Keycode) -> Self {
        Self {
            code,
            state: KeyState::Pressed,
        }
    }

    pub fn released(code: Keycode) -> Self {
        Self {
            code,
            state: KeyState::Released,
        }
    }

    /// Map a raw evdev record, dropping non-key events and repeats
    pub fn from_raw(event_type: EventType, code: u16, value: i32) -> Option<Self> {
        if event_type != EventType::KEY {
            return None;
        }
        let code = Keycode::from(code);
        match value {
            input::KEY_PRESS => Some(Self::pressed(code)),
            input::KEY_RELEASE => Some(Self::released(code)),
            input::KEY_REPEAT => None,
            other => {
                trace!(code, value = other, "Unknown key event value");
                None
            }
        }
    }
}

/// Where key events come from
pub trait KeySource {
    /// Key transitions from one read; empty if the wait timed out
    fn read_keys(&mut self) -> io::Result<Vec<KeyEvent>>;
}

/// An opened evdev node
pub struct EvdevSource {
    device: Device,
    path: PathBuf,
}

impl EvdevSource {
    pub fn open(path: &Path) -> Result<Self, DaemonError> {
        let device = Device::open(path).map_err(|source| DaemonError::DeviceOpen {
            path: path.to_path_buf(),
            source,
        })?;
        info!(device_path = %path.display(), name = ?device.name(), "Opened input device");
        Ok(Self {
            device,
            path: path.to_path_buf(),
        })
    }

    /// Block for at most the poll timeout; false when nothing arrived
    fn wait_readable(&self) -> io::Result<bool> {
        let mut fds = [PollFd::new(self.device.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(input::POLL_TIMEOUT_MS)) {
            Ok(ready) => Ok(ready > 0),
            // A signal (shutdown request) woke us up
            Err(Errno::EINTR) => Ok(false),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }
}

impl KeySource for EvdevSource {
    fn read_keys(&mut self) -> io::Result<Vec<KeyEvent>> {
        if !self.wait_readable()? {
            return Ok(Vec::new());
        }
        let events = match self.device.fetch_events() {
            Ok(events) => events,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(events
            .filter_map(|event| KeyEvent::from_raw(event.event_type(), event.code(), event.value()))
            .collect())
    }
}

impl Drop for EvdevSource {
    fn drop(&mut self) {
        info!(device_path = %self.path.display(), "Closing input device");
    }
}

/// All event devices that report key events, sorted by path
pub fn list_keyboard_devices() -> io::Result<Vec<(PathBuf, String)>> {
    info!(path = %paths::DEV_INPUT, "Scanning for keyboard devices...");

    let mut devices = Vec::new();
    for entry in std::fs::read_dir(paths::DEV_INPUT)? {
        let path = entry?.path();
        let is_event_node = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("event"));
        if !is_event_node {
            continue;
        }

        match Device::open(&path) {
            Ok(device) if device.supported_events().contains(EventType::KEY) => {
                let name = device.name().unwrap_or("unknown").to_string();
                devices.push((path, name));
            }
            Ok(_) => {}
            Err(e) => warn!(device_path = %path.display(), error = %e, "Cannot open device"),
        }
    }
    devices.sort();
    Ok(devices)
}

/// Check if input devices are readable (user has input group permissions)
pub fn check_permissions() -> bool {
    std::fs::read_dir(paths::DEV_INPUT).is_ok()
}

/// Print helpful error message if permissions missing
pub fn print_permission_error() {
    error!(path = %paths::DEV_INPUT, "Cannot access input devices");
    error!(group = %permissions::INPUT_GROUP, "Reading key events requires group membership");
    error!(command = %permissions::ADD_TO_INPUT_GROUP, "Add user to input group");
    error!("  Then log out and back in");
}
