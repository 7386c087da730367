//! Core trait for serial port abstraction.
//!
//! Defines the `SerialPortAdapter` trait that lets the real tty [`Port`] and
//! the in-memory mock be driven interchangeably, e.g. by the interactive
//! pump.
//!
//! [`Port`]: super::Port

use super::error::PortResult;
use super::tty_port::Port;

/// Byte-level I/O shared by every port implementation.
///
/// Methods take `&self` so a port can be shared between a pump thread and
/// the thread that eventually closes it.
pub trait SerialPortAdapter: Send + Sync + std::fmt::Debug {
    /// Write bytes to the port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&self, data: &[u8]) -> PortResult<usize>;

    /// Read whatever is available into `buffer`.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&self, buffer: &mut [u8]) -> PortResult<usize>;

    /// Get the name/path of this port.
    fn name(&self) -> String;

    /// Whether the port can still be used.
    fn is_open(&self) -> bool;

    /// Bytes received but not yet read.
    fn bytes_to_read(&self) -> PortResult<usize>;

    /// Bytes written but not yet transmitted.
    fn bytes_to_write(&self) -> PortResult<usize> {
        Ok(0)
    }
}

impl SerialPortAdapter for Port {
    fn write_bytes(&self, data: &[u8]) -> PortResult<usize> {
        self.send(data)
    }

    fn read_bytes(&self, buffer: &mut [u8]) -> PortResult<usize> {
        self.read_some(buffer)
    }

    fn name(&self) -> String {
        self.path()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }

    fn is_open(&self) -> bool {
        Port::is_open(self)
    }

    fn bytes_to_read(&self) -> PortResult<usize> {
        self.in_waiting()
    }

    fn bytes_to_write(&self) -> PortResult<usize> {
        self.out_waiting()
    }
}
