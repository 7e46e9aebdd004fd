//! Configuration loading and validation for the logging pipeline.
//!
//! Uses serde_yaml to load YAML configuration files with support for
//! environment variable overrides:
//! - `ENVIRONMENT` replaces `environment`
//! - `LOG_LEVEL` replaces `log.level`
//! - `APPLICATIONINSIGHTS_CONNECTION_STRING` supplies the telemetry
//!   connection string

mod error;
mod integrations;
mod log;
mod units;

pub use error::ConfigError;
pub use integrations::{AppInsightsConfig, AzureConfig, JobDashboardConfig};
pub use log::LogConfig;

use serde::Deserialize;
use std::path::Path;
use std::{env, fs};

use crate::environment::DeployEnvironment;
use crate::level::LogLevel;
use crate::sinks::telemetry::ConnectionString;

pub const ENVIRONMENT_VAR: &str = "ENVIRONMENT";
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
pub const CONNECTION_STRING_VAR: &str = "APPLICATIONINSIGHTS_CONNECTION_STRING";

/// Root configuration.
///
/// Every section is optional; an empty mapping yields file-only logging at
/// `Information` under `logs/`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    /// Deployment environment name, e.g. "Production".
    ///
    /// An unrecognized name fails `validate` (and therefore `load`) with
    /// `ConfigError::Environment`. Only an unset environment reaches the path
    /// resolver as `None` and falls back to the relative `logs/` directory.
    #[serde(default)]
    pub environment: Option<String>,
    /// Core pipeline settings.
    #[serde(default)]
    pub log: LogConfig,
    /// Job dashboard sink (optional).
    #[serde(default, alias = "job_dashboard")]
    pub hangfire: Option<JobDashboardConfig>,
    /// Azure integrations (optional).
    #[serde(default)]
    pub azure: Option<AzureConfig>,
}

impl Config {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Loads `.env` first (if present), then the YAML file, then applies
    /// environment variable overrides and validates the result.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let content = fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;

        config.apply_overrides(|name| env::var(name).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a YAML string without overrides or
    /// validation.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, usually the process environment.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(env) = lookup(ENVIRONMENT_VAR).filter(|v| !v.trim().is_empty()) {
            self.environment = Some(env);
        }
        if let Some(level) = lookup(LOG_LEVEL_VAR).filter(|v| !v.trim().is_empty()) {
            self.log.level = Some(level);
        }

        if let Some(ref mut azure) = self.azure {
            if let Some(ref mut insights) = azure.app_insights {
                if insights.enable {
                    insights.connection_string = lookup(CONNECTION_STRING_VAR).unwrap_or_default();
                }
            }
        }
    }

    /// The configured environment, `None` when unset or unrecognized.
    /// Validated configurations only yield `None` when unset.
    pub fn deploy_environment(&self) -> Option<DeployEnvironment> {
        self.environment.as_deref().and_then(DeployEnvironment::from_name)
    }

    /// The job dashboard section, if enabled.
    pub fn job_dashboard(&self) -> Option<&JobDashboardConfig> {
        self.hangfire.as_ref().filter(|j| j.enabled)
    }

    /// The Application Insights section, if enabled.
    pub fn app_insights(&self) -> Option<&AppInsightsConfig> {
        self.azure
            .as_ref()
            .and_then(|a| a.app_insights.as_ref())
            .filter(|a| a.enable)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref name) = self.environment {
            name.parse::<DeployEnvironment>()?;
        }

        self.log.level()?;

        if self.log.file_name.trim().is_empty() {
            return Err(ConfigError::Validation("log.file_name is required".into()));
        }
        if self.log.buffer_size == 0 {
            return Err(ConfigError::Validation("log.buffer_size must be positive".into()));
        }
        if self.log.file_size_limit == 0 {
            return Err(ConfigError::Validation("log.file_size_limit must be positive".into()));
        }
        if self.log.retained_file_count == 0 {
            return Err(ConfigError::Validation(
                "log.retained_file_count must be positive".into(),
            ));
        }
        for name in self.log.paths.keys() {
            if DeployEnvironment::from_name(name).is_none() {
                return Err(ConfigError::Validation(format!(
                    "log.paths: unknown environment: {}",
                    name
                )));
            }
        }

        if let Some(jobs) = self.job_dashboard() {
            jobs.level()?;
            if jobs.capacity == 0 {
                return Err(ConfigError::Validation("hangfire.capacity must be positive".into()));
            }
        }

        if let Some(insights) = self.app_insights() {
            insights.level()?;
            if insights.connection_string.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "azure.app_insights: connection string not found (set {} env var)",
                    CONNECTION_STRING_VAR
                )));
            }
            ConnectionString::parse(&insights.connection_string)
                .map_err(|e| ConfigError::Validation(format!("azure.app_insights: {}", e)))?;
            if insights.queue_size == 0 || insights.batch_size == 0 {
                return Err(ConfigError::Validation(
                    "azure.app_insights: queue_size and batch_size must be positive".into(),
                ));
            }
            if insights.flush_interval.is_zero() {
                return Err(ConfigError::Validation(
                    "azure.app_insights.flush_interval must be positive".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Parses an optional level name, naming the offending key on failure.
fn parse_level(key: &str, value: Option<&str>, default: LogLevel) -> Result<LogLevel, ConfigError> {
    match value {
        None => Ok(default),
        Some(name) => name
            .parse()
            .map_err(|e| ConfigError::Validation(format!("{}: {}", key, e))),
    }
}
