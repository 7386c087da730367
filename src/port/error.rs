//! Port-specific error types.
//!
//! Every failure of the tty engine is reported through [`PortError`]. Partial
//! transfers are carried inside the error so a caller can still account for
//! bytes moved before a deadline or a device loss.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// An operation was attempted on a closed port.
    #[error("Port is not open")]
    NotOpen,

    /// The port object already owns an open descriptor.
    #[error("Port is already open: {0}")]
    AlreadyOpen(PathBuf),

    /// The device path does not exist.
    #[error("Serial device not found: {0}")]
    NotFound(PathBuf),

    /// The path exists but is not a character-special device.
    #[error("Not a character device: {0}")]
    NotACharacterDevice(PathBuf),

    /// The deadline elapsed with no readiness.
    #[error("Port timed out after transferring {transferred} byte(s)")]
    Timeout { transferred: usize },

    /// A read returned zero bytes after a positive readiness signal.
    #[error("Device disconnected or held open elsewhere after {transferred} byte(s)")]
    DeviceGone { transferred: usize },

    /// A line-level call was woken by `cancel_read`/`cancel_write` before
    /// it completed.
    #[error("Cancelled after transferring {transferred} byte(s)")]
    Cancelled { transferred: usize },

    /// An underlying OS call failed.
    #[error("{op} failed: {source}")]
    Syscall {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// The requested combination has no mapping on this platform.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A semantic setting is outside its documented value set.
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// A pseudo-file line could not be parsed.
    #[error("{origin}:{line}: {message}")]
    MalformedInput {
        origin: String,
        line: usize,
        message: String,
    },
}

impl PortError {
    /// Capture `errno` for the syscall that just failed.
    pub fn last_os_error(op: &'static str) -> Self {
        Self::Syscall {
            op,
            source: io::Error::last_os_error(),
        }
    }

    /// Wrap an explicit errno value.
    pub fn from_errno(op: &'static str, errno: i32) -> Self {
        Self::Syscall {
            op,
            source: io::Error::from_raw_os_error(errno),
        }
    }

    /// Create an Unsupported error from a message.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create an InvalidSetting error from a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidSetting(message.into())
    }

    /// The raw OS error code, when this error wraps a failed syscall.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Syscall { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// Bytes moved before the failure, for the I/O errors that track it.
    pub fn transferred(&self) -> usize {
        match self {
            Self::Timeout { transferred }
            | Self::DeviceGone { transferred }
            | Self::Cancelled { transferred } => *transferred,
            _ => 0,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<PortError> for io::Error {
    fn from(err: PortError) -> Self {
        let kind = match &err {
            PortError::NotOpen => io::ErrorKind::NotConnected,
            PortError::AlreadyOpen(_) => io::ErrorKind::AlreadyExists,
            PortError::NotFound(_) => io::ErrorKind::NotFound,
            PortError::NotACharacterDevice(_) | PortError::InvalidSetting(_) => {
                io::ErrorKind::InvalidInput
            }
            PortError::Timeout { .. } => io::ErrorKind::TimedOut,
            PortError::DeviceGone { .. } => io::ErrorKind::BrokenPipe,
            PortError::Cancelled { .. } => io::ErrorKind::Interrupted,
            PortError::Unsupported(_) => io::ErrorKind::Unsupported,
            PortError::MalformedInput { .. } => io::ErrorKind::InvalidData,
            PortError::Syscall { source, .. } => source.kind(),
        };
        io::Error::new(kind, err)
    }
}

/// Result alias for tty operations.
pub type PortResult<T> = Result<T, PortError>;
