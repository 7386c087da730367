//! Port abstraction layer for serial communication.
//!
//! Semantic settings and their termios/RS-485 translation, the tty
//! [`Port`] itself, the [`SerialPortAdapter`] trait with an in-memory mock,
//! and the interactive pump built on that trait.

pub mod error;
pub mod mock;
pub mod pump;
pub mod rs485;
pub mod settings;
pub mod termios;
pub mod traits;
pub mod tty_port;

pub use error::{PortError, PortResult};
pub use mock::MockSerialPort;
pub use pump::interact;
pub use settings::{BitRate, CharSize, Parity, PortSettings, Rs485Settings, StopBits, TermiosSettings};
pub use traits::SerialPortAdapter;
pub use tty_port::{Port, DEFAULT_TIMEOUT, STOPS};
