//! Logger error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while building or installing a logger.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("a global logger is already installed")]
    AlreadyInstalled,
    #[error("failed to swap sinks: {0}")]
    Reload(String),
    #[error("telemetry sink requires a running tokio runtime")]
    NoRuntime,
    #[error("telemetry error: {0}")]
    Telemetry(#[from] crate::sinks::telemetry::TelemetryError),
}
