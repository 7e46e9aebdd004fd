//! Log pipeline configuration.

use serde::Deserialize;
use std::collections::HashMap;

use super::{ConfigError, parse_level, units};
use crate::level::LogLevel;
use crate::path::{LogFileName, LogPathTable, RootDirs};
use crate::sinks::rolling::{DEFAULT_FILE_SIZE_LIMIT, DEFAULT_RETAINED_FILE_COUNT};
use crate::sinks::{DEFAULT_BUFFER_SIZE, FileOptions, FileWriteMode, RollingOptions};

/// The `log` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Also write to the console.
    pub console: bool,
    /// Minimum level: "verbose", "debug", "information", "warning", "error", "fatal".
    pub level: Option<String>,
    /// File name template, "log.log" or "log-.log".
    pub file_name: String,
    /// File sink durability: "synchronous" or "buffered".
    pub file_write: FileWriteMode,
    /// Capacity of the non-blocking queues, in lines.
    pub buffer_size: usize,
    /// Size at which the file rolls over (e.g. "100MB").
    #[serde(deserialize_with = "units::deserialize_size")]
    pub file_size_limit: u64,
    /// Number of rolled files kept on disk.
    pub retained_file_count: usize,
    /// Log roots per environment name, replacing the built-in ones.
    pub paths: HashMap<String, RootDirs>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console: false,
            level: None,
            file_name: LogFileName::FIXED.to_string(),
            file_write: FileWriteMode::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            file_size_limit: DEFAULT_FILE_SIZE_LIMIT,
            retained_file_count: DEFAULT_RETAINED_FILE_COUNT,
            paths: HashMap::new(),
        }
    }
}

impl LogConfig {
    /// Configured level, or `Information` when unset.
    pub fn level(&self) -> Result<LogLevel, ConfigError> {
        parse_level("log.level", self.level.as_deref(), LogLevel::DEFAULT)
    }

    pub fn file_name(&self) -> LogFileName {
        LogFileName::new(self.file_name.clone())
    }

    pub fn path_table(&self) -> LogPathTable {
        LogPathTable::default().merged(&self.paths)
    }

    pub fn file_options(&self) -> FileOptions {
        FileOptions {
            write_mode: self.file_write,
            rolling: RollingOptions {
                file_size_limit: self.file_size_limit,
                retained_file_count: self.retained_file_count,
            },
            buffer_size: Some(self.buffer_size),
        }
    }
}
