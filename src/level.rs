//! Log levels and the shared, live-updatable level switch.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::Level;
use tracing::level_filters::LevelFilter;

/// Severity names accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Verbose,
    Debug,
    Information,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    /// Default level when configuration does not name one.
    pub const DEFAULT: LogLevel = LogLevel::Information;

    pub fn as_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Verbose => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Information => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error | LogLevel::Fatal => LevelFilter::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Verbose => "verbose",
            LogLevel::Debug => "debug",
            LogLevel::Information => "information",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Error returned for level names that are not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "verbose" | "trace" => Ok(LogLevel::Verbose),
            "debug" => Ok(LogLevel::Debug),
            "information" | "info" => Ok(LogLevel::Information),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "fatal" | "critical" => Ok(LogLevel::Fatal),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        level.as_filter()
    }
}

/// Minimum-severity threshold shared by every sink of a logger.
///
/// Reads happen on every event, writes only on reconfiguration, so the
/// threshold lives in a single atomic. Clones share the same threshold.
#[derive(Clone)]
pub struct LevelSwitch {
    inner: Arc<AtomicU8>,
}

impl LevelSwitch {
    pub fn new(level: impl Into<LevelFilter>) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(encode(level.into()))),
        }
    }

    pub fn get(&self) -> LevelFilter {
        decode(self.inner.load(Ordering::Relaxed))
    }

    pub fn set(&self, level: impl Into<LevelFilter>) {
        self.inner.store(encode(level.into()), Ordering::Relaxed);
    }

    /// Returns true if events at `level` pass the current threshold.
    pub fn allows(&self, level: &Level) -> bool {
        *level <= self.get()
    }

    /// True if both handles point at the same threshold.
    pub fn same_as(&self, other: &LevelSwitch) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for LevelSwitch {
    fn default() -> Self {
        Self::new(LogLevel::DEFAULT)
    }
}

impl fmt::Debug for LevelSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LevelSwitch").field(&self.get()).finish()
    }
}

fn encode(filter: LevelFilter) -> u8 {
    match filter.into_level() {
        None => 0,
        Some(Level::ERROR) => 1,
        Some(Level::WARN) => 2,
        Some(Level::INFO) => 3,
        Some(Level::DEBUG) => 4,
        Some(Level::TRACE) => 5,
    }
}

fn decode(raw: u8) -> LevelFilter {
    match raw {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        4 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
