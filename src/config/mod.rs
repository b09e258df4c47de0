//! Configuration management for babybinds
//!
//! Two layers:
//! - **parser**: the binding file grammar (`~/.babybindsrc`)
//! - **Settings**: runtime options resolved from the command line

pub mod parser;

pub use parser::parse_bindings;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bindings::BindingStore;
use crate::constants::{combo, paths, retry};

/// Why a binding record was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("empty keycode field")]
    EmptyField,
    #[error("keycode is ridiculously big (more than {max} digits)")]
    KeycodeTooLong { max: usize },
    #[error("key combo has too many keycodes (max {max})")]
    TooManyKeycodes { max: usize },
    #[error("keycode is not a positive integer; invalid character {found:?}")]
    InvalidKeycode { found: char },
    #[error("incomplete keybind (missing command)")]
    MissingCommand,
}

/// Errors that abort loading the binding file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    HomeNotSet,

    #[error("{path} could not be opened: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration file on line {line}: {reason}")]
    Malformed { line: usize, reason: Malformed },

    #[error("out of memory while loading bindings")]
    OutOfMemory,
}

/// Device read retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated; one more is fatal
    pub max_failures: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_failures: retry::MAX_READ_FAILURES,
            pause: retry::READ_FAILURE_PAUSE,
        }
    }
}

/// What the process was asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Match combos and launch commands
    Daemon,
    /// Log keycodes of pressed keys, launch nothing
    ShowKeycodes,
}

/// Runtime settings, assembled once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub device: PathBuf,
    pub config_path: PathBuf,
    /// Keys held at once, and keycodes per binding
    pub max_combo: usize,
    pub retry: RetryPolicy,
    pub mode: RunMode,
}

impl Settings {
    pub fn new(device: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = match config_path {
            Some(path) => path,
            None => default_config_path()?,
        };
        Ok(Self {
            device,
            config_path,
            max_combo: combo::DEFAULT_MAX_COMBO,
            retry: RetryPolicy::default(),
            mode: RunMode::Daemon,
        })
    }
}

/// `$HOME/.babybindsrc`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeNotSet)?;
    Ok(home.join(paths::CONFIG_FILENAME))
}

/// Read and parse the binding file. Any error discards every binding.
pub fn load_bindings(path: &Path, max_combo: usize) -> Result<BindingStore, ConfigError> {
    let contents = fs::read(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let store = parse_bindings(&contents, max_combo)?;

    if store.is_empty() {
        warn!(path = %path.display(), "No keybinds defined");
    } else {
        info!(path = %path.display(), count = store.len(), "Loaded keybinds");
    }
    for binding in store.iter() {
        debug!(%binding, "Keybind");
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_bindings_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# volume").unwrap();
        writeln!(file, "114:amixer set Master 5%-").unwrap();
        writeln!(file, "29;56;20:xterm").unwrap();

        let store = load_bindings(file.path(), 5).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.iter().nth(1).unwrap().keys(), &[20, 29, 56]);
    }

    #[test]
    fn test_load_bindings_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope");

        let err = load_bindings(&path, 5).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { path: p, .. } if p == path));
    }

    #[test]
    fn test_load_bindings_malformed_keeps_nothing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1:true").unwrap();
        writeln!(file, ":cmd").unwrap();

        let err = load_bindings(file.path(), 5).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Malformed { line: 2, reason: Malformed::EmptyField }
        ));
    }

    #[test]
    fn test_settings_explicit_config_path() {
        let settings = Settings::new(
            PathBuf::from("/dev/input/event3"),
            Some(PathBuf::from("/tmp/binds")),
        )
        .unwrap();
        assert_eq!(settings.config_path, PathBuf::from("/tmp/binds"));
        assert_eq!(settings.max_combo, 5);
        assert_eq!(settings.retry.max_failures, 10);
        assert_eq!(settings.retry.pause, Duration::from_secs(3));
        assert_eq!(settings.mode, RunMode::Daemon);
    }

    #[test]
    fn test_error_messages() {
        let err = ConfigError::Malformed {
            line: 4,
            reason: Malformed::TooManyKeycodes { max: 5 },
        };
        assert_eq!(
            err.to_string(),
            "malformed configuration file on line 4: key combo has too many keycodes (max 5)"
        );
    }
}
