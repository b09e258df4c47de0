use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Fatal daemon errors; each one ends the process with a failure status
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not open input device {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input device read failed {attempts} times in a row")]
    DeviceRead {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("could not install signal handlers")]
    Signals(#[source] std::io::Error),
}
