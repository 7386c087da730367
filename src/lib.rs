//! POSIX serial tty library
//!
//! Opens a tty device node, puts it in raw mode with the requested line
//! settings, and performs reads and writes that are bounded by a per-port
//! timeout and can be cancelled from another thread.
//!
//! # Modules
//!
//! - `sys`: thin wrappers over descriptors, `select(2)`, tty ioctls and the cancel pipe
//! - `port`: line settings, termios translation, RS-485, and the [`Port`] itself
//! - `device`: device numbers, kernel driver class names and sysfs lookup
//! - `config`: TOML configuration with environment overrides
//! - `logging`: tracing subscriber setup for the command-line tool
//! - `error`: application-level error type
//!
//! # Example
//!
//! ```rust,no_run
//! use sio_tty::{BitRate, Port, PortSettings};
//!
//! let port = Port::new();
//! let mut settings = PortSettings::default();
//! settings.termios.speed = BitRate::from_baud(115_200)?;
//! port.open_with("/dev/ttyUSB0", settings)?;
//! port.write_line("AT")?;
//! let reply = port.read_until(&sio_tty::STOPS)?;
//! println!("{reply}");
//! # Ok::<(), sio_tty::PortError>(())
//! ```

#[cfg(not(unix))]
compile_error!("sio_tty only supports unix targets");

pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod port;
pub mod sys;

pub use error::{AppError, AppResult};
pub use port::{
    BitRate, CharSize, MockSerialPort, Parity, Port, PortError, PortResult, PortSettings,
    Rs485Settings, SerialPortAdapter, StopBits, TermiosSettings, DEFAULT_TIMEOUT, STOPS,
};
pub use device::{DeviceClassCache, DeviceClassMap, DeviceId, SysfsLocator};
pub use sys::{FlowAction, ModemLines, Queue};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
