//! Bootstrap logger, active before configuration is loaded.

use tracing::level_filters::LevelFilter;

use super::{Logger, LoggerConfiguration, LoggingError};
use crate::environment::DeployEnvironment;
use crate::path::{self, LogFileName, LogPathTable};
use crate::sinks::{ConsoleOptions, DEFAULT_BUFFER_SIZE, FileOptions, FileWriteMode, RollingOptions};

/// Settings for the bootstrap logger. The defaults need nothing from
/// configuration.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub file_name: LogFileName,
    pub table: LogPathTable,
    pub file_write: FileWriteMode,
    pub buffer_size: usize,
    pub rolling: RollingOptions,
    /// Remove a file left at exactly the resolved path by a previous run.
    pub delete_existing: bool,
    /// Check the log directory is writable and report problems on stdout.
    pub probe: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            file_name: LogFileName::default(),
            table: LogPathTable::default(),
            file_write: FileWriteMode::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            rolling: RollingOptions::default(),
            delete_existing: false,
            probe: false,
        }
    }
}

/// Describes the bootstrap pipeline without installing it: verbose level,
/// async console, file sink at the environment's log path.
///
/// Creates the log directory, so this succeeds on a fresh machine.
pub fn bootstrap_configuration(
    env: Option<DeployEnvironment>,
    options: &BootstrapOptions,
) -> Result<LoggerConfiguration, LoggingError> {
    let log_path = path::resolve_with_fallback(env, &options.file_name, &options.table);
    println!("[bootstrap] Using log path: {}", log_path);

    path::ensure_parent_dir(&log_path)?;
    if options.delete_existing {
        path::delete_if_exists(&log_path);
    }
    if options.probe {
        path::probe_write(&log_path);
    }

    let configuration = LoggerConfiguration::new()
        .minimum_level(LevelFilter::TRACE)
        .switch_level(LevelFilter::TRACE)
        .write_to_console(ConsoleOptions {
            buffer_size: options.buffer_size,
            ..ConsoleOptions::default()
        })
        .write_to_file(
            log_path,
            FileOptions {
                write_mode: options.file_write,
                rolling: options.rolling,
                buffer_size: Some(options.buffer_size),
            },
        );
    Ok(configuration)
}

/// Builds the bootstrap logger for `env` and installs it process-wide.
///
/// Fails with [`LoggingError::AlreadyInstalled`] when called twice.
pub fn build_bootstrap_logger(env: DeployEnvironment) -> Result<Logger, LoggingError> {
    build_bootstrap_logger_with(env, &BootstrapOptions::default())
}

pub fn build_bootstrap_logger_with(
    env: DeployEnvironment,
    options: &BootstrapOptions,
) -> Result<Logger, LoggingError> {
    let logger = bootstrap_configuration(Some(env), options)?.create_logger()?;
    logger.install_global()?;
    Ok(logger)
}
