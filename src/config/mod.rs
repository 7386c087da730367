//! Configuration module for sio-tty.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SIO_TTY_CONFIG` environment variable (explicit path)
//! 2. `./sio-tty.toml` (current directory)
//! 3. `~/.config/sio-tty/sio-tty.toml` (XDG)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Common values can be overridden via environment variables.
//! The pattern is: `SIO_TTY_<SECTION>_<KEY>`
//!
//! Examples:
//! - `SIO_TTY_SERIAL_DEVICE=/dev/ttyUSB0`
//! - `SIO_TTY_SERIAL_BAUD=115200`
//! - `SIO_TTY_LOGGING_FORMAT=json`
//!
//! # Example
//!
//! ```rust,no_run
//! use sio_tty::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let settings = loader.config().port_settings()?;
//! println!("line: {}", settings.termios);
//! # Ok::<(), sio_tty::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, DeviceConfig, LogFormat, LoggingConfig, Rs485Config, SerialConfig};
