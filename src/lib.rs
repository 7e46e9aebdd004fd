//! Logging pipeline setup for hosted services.
//!
//! A bootstrap logger (verbose console and file) is installed as soon as the
//! deployment environment is known. Once configuration is loaded the same
//! logger is reconfigured in place: the level comes from configuration and
//! can change at runtime through a shared [`LevelSwitch`], and optional job
//! dashboard and telemetry sinks are attached.

pub mod config;
pub mod environment;
pub mod level;
pub mod logger;
pub mod path;
pub mod sinks;
pub mod watcher;

pub use config::{Config, ConfigError};
pub use environment::DeployEnvironment;
pub use level::{LevelSwitch, LogLevel};
pub use logger::{Logger, LoggerConfiguration, LoggingError, build_bootstrap_logger};
pub use path::{LogFileName, LogPath, LogPathTable};
