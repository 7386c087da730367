//! Failures while resolving, overriding or saving `sio-tty.toml`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The resolved file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not TOML, or does not fit the `[serial]`/`[rs485]`/
    /// `[logging]` layout.
    #[error("{}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A value that parsed as TOML but names no valid line setting, e.g.
    /// `serial.baud = 12345`.
    #[error("{key}: {message}")]
    Setting { key: String, message: String },

    /// A `SIO_TTY_<SECTION>_<KEY>` variable whose value does not parse.
    #[error("{var}: {message}")]
    Override { var: String, message: String },

    /// `save` on a loader that was built from defaults only.
    #[error("no configuration file to save to")]
    NoPath,
}

impl ConfigError {
    pub fn setting(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Setting {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn bad_override(var: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Override {
            var: var.into(),
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
