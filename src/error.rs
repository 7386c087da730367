use crate::config::ConfigError;
use crate::port::PortError;
use thiserror::Error;

/// A specialized `Result` type for the command-line front end.
pub type AppResult<T> = Result<T, AppError>;

/// Unified application error type.
///
/// Library calls return [`PortError`] or [`ConfigError`]; this wraps them so
/// the binary can use `?` across both.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Port(#[from] PortError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("An I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("A serialization error occurred: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl AppError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) | Self::Config(_) => 2,
            Self::Port(PortError::Timeout { .. }) => 3,
            _ => 1,
        }
    }
}
