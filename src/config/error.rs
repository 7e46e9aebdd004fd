//! Configuration error types.

use thiserror::Error;

use crate::environment::UnknownEnvironment;

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("{0}")]
    Environment(#[from] UnknownEnvironment),
    #[error("validation failed: {0}")]
    Validation(String),
}
