//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over the configured level so a single run can
//! be made noisier without touching the config file.

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{AppError, AppResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Build the filter: `RUST_LOG` if set, else the configured level.
pub fn filter(config: &LoggingConfig) -> AppResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| AppError::Logging(format!("bad level '{}': {e}", config.level))),
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays clean
/// for data read from the line.
pub fn init(config: &LoggingConfig) -> AppResult<()> {
    let filter = filter(config)?;

    let layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}
