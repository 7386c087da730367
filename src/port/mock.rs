//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates a tty without requiring a
//! device node. Supports a scripted read queue, a write log, write
//! expectations, injected timeouts and closing from another thread.

use super::error::{PortError, PortResult};
use super::traits::SerialPortAdapter;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Inner state of the mock port, protected by a mutex for interior mutability.
#[derive(Debug)]
struct MockPortState {
    /// Queue of bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Log of all bytes written to the port.
    write_log: Vec<Vec<u8>>,
    /// Expected write operations (for verification).
    expected_writes: VecDeque<Vec<u8>>,
    /// Whether the next operation should time out.
    should_timeout: bool,
    open: bool,
}

/// Mock serial port implementation for testing.
///
/// Clones share state, so a test can keep one handle while a pump drives
/// another.
///
/// # Example
/// ```
/// use sio_tty::port::{MockSerialPort, SerialPortAdapter};
///
/// let port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"Hello, World!");
///
/// let mut buffer = [0u8; 13];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hello, World!");
///
/// port.write_bytes(b"Response").unwrap();
/// assert_eq!(port.get_write_log(), vec![b"Response".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    /// The port name/identifier.
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create an open mock port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                read_queue: VecDeque::new(),
                write_log: Vec::new(),
                expected_writes: VecDeque::new(),
                should_timeout: false,
                open: true,
            })),
        }
    }

    /// Append bytes to the read queue.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Expect a specific write operation.
    ///
    /// Use `verify_expectations()` to check that all expected writes occurred.
    pub fn expect_write(&self, data: &[u8]) {
        self.state.lock().expected_writes.push_back(data.to_vec());
    }

    /// Verify that all expected writes have occurred in order.
    pub fn verify_expectations(&self) -> Result<(), String> {
        let state = self.state.lock();
        if !state.expected_writes.is_empty() {
            return Err(format!(
                "Expected {} more write(s), but none occurred",
                state.expected_writes.len()
            ));
        }
        Ok(())
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Everything written, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().write_log.concat()
    }

    /// Make the next read or write fail with `Timeout`.
    pub fn set_should_timeout(&self, should_timeout: bool) {
        self.state.lock().should_timeout = should_timeout;
    }

    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    /// Every later operation fails with `NotOpen`.
    pub fn close(&self) {
        self.state.lock().open = false;
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&self, data: &[u8]) -> PortResult<usize> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::Timeout { transferred: 0 });
        }

        state.write_log.push(data.to_vec());

        if let Some(expected) = state.expected_writes.pop_front() {
            if expected != data {
                return Err(PortError::invalid(format!(
                    "Expected write: {:?}, got: {:?}",
                    expected, data
                )));
            }
        }

        Ok(data.len())
    }

    fn read_bytes(&self, buffer: &mut [u8]) -> PortResult<usize> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::Timeout { transferred: 0 });
        }

        let n = buffer.len().min(state.read_queue.len());
        for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
            *slot = byte;
        }
        if n == 0 {
            // an idle line behaves like a deadline miss
            return Err(PortError::Timeout { transferred: 0 });
        }
        Ok(n)
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn bytes_to_read(&self) -> PortResult<usize> {
        let state = self.state.lock();
        if !state.open {
            return Err(PortError::NotOpen);
        }
        Ok(state.read_queue.len())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_read() {
        let port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello");

        let mut buffer = [0u8; 10];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buffer[..n], b"Hello");
    }

    #[test]
    fn test_write_logging() {
        let port = MockSerialPort::new("MOCK0");
        port.write_bytes(b"Test1").unwrap();
        port.write_bytes(b"Test2").unwrap();

        let log = port.get_write_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0], b"Test1");
        assert_eq!(log[1], b"Test2");
        assert_eq!(port.written(), b"Test1Test2");
    }

    #[test]
    fn test_expect_write_mismatch() {
        let port = MockSerialPort::new("MOCK0");
        port.expect_write(b"Expected");
        assert!(port.verify_expectations().is_err());

        let result = port.write_bytes(b"Different");
        assert!(matches!(result, Err(PortError::InvalidSetting(_))));
        assert!(port.verify_expectations().is_ok());
    }

    #[test]
    fn test_timeout_simulation() {
        let port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"data");
        port.set_should_timeout(true);

        let mut buffer = [0u8; 10];
        assert!(port.read_bytes(&mut buffer).unwrap_err().is_timeout());
        assert_eq!(port.read_bytes(&mut buffer).unwrap(), 4);
    }

    #[test]
    fn test_empty_read_times_out() {
        let port = MockSerialPort::new("MOCK0");
        let mut buffer = [0u8; 10];
        assert!(matches!(
            port.read_bytes(&mut buffer),
            Err(PortError::Timeout { transferred: 0 })
        ));
    }

    #[test]
    fn test_partial_read() {
        let port = MockSerialPort::new("MOCK0");
        port.enqueue_read(b"Hello, World!");

        let mut buffer = [0u8; 5];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"Hello");
        assert_eq!(port.bytes_to_read().unwrap(), 8);
    }

    #[test]
    fn test_close_is_shared_between_clones() {
        let port = MockSerialPort::new("MOCK0");
        let other = port.clone();
        other.close();

        assert!(!port.is_open());
        assert!(matches!(port.write_bytes(b"x"), Err(PortError::NotOpen)));
        assert!(matches!(port.bytes_to_read(), Err(PortError::NotOpen)));
    }
}
