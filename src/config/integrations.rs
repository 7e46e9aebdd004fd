//! Optional sink integrations.

use serde::Deserialize;
use std::time::Duration;

use super::{ConfigError, parse_level, units};
use crate::level::LogLevel;
use crate::sinks::job_dashboard::DEFAULT_CAPACITY;
use crate::sinks::telemetry::TelemetryOptions;

/// Background-job dashboard sink.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobDashboardConfig {
    /// Whether the dashboard sink is attached.
    #[serde(default)]
    pub enabled: bool,
    /// Minimum level for the dashboard (default: information).
    pub level: Option<String>,
    /// Entries kept in memory.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl JobDashboardConfig {
    pub fn level(&self) -> Result<LogLevel, ConfigError> {
        parse_level("hangfire.level", self.level.as_deref(), LogLevel::Information)
    }
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

/// The `azure` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AzureConfig {
    pub app_insights: Option<AppInsightsConfig>,
}

/// Application Insights telemetry sink.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppInsightsConfig {
    /// Whether the telemetry sink is attached.
    #[serde(default, alias = "enabled")]
    pub enable: bool,
    /// Minimum level for telemetry (default: warning).
    pub level: Option<String>,
    /// Connection string (loaded from APPLICATIONINSIGHTS_CONNECTION_STRING env var).
    #[serde(skip)]
    pub connection_string: String,
    /// Events queued before new ones are dropped.
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// Events per request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum time an event waits before being sent (default: 5s).
    #[serde(default = "default_flush_interval", deserialize_with = "units::deserialize_duration")]
    pub flush_interval: Duration,
}

impl AppInsightsConfig {
    pub fn level(&self) -> Result<LogLevel, ConfigError> {
        parse_level("azure.app_insights.level", self.level.as_deref(), LogLevel::Warning)
    }

    pub fn telemetry_options(&self) -> TelemetryOptions {
        TelemetryOptions {
            queue_size: self.queue_size,
            batch_size: self.batch_size,
            flush_interval: self.flush_interval,
        }
    }
}

fn default_queue_size() -> usize {
    TelemetryOptions::default().queue_size
}

fn default_batch_size() -> usize {
    TelemetryOptions::default().batch_size
}

fn default_flush_interval() -> Duration {
    TelemetryOptions::default().flush_interval
}
