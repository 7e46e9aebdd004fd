//! Runtime configuration, applied once the configuration file is loaded.

use std::sync::Arc;

use tracing::{debug, info};

use super::{LoggerConfiguration, LoggingError};
use crate::config::Config;
use crate::path::{self, LogPath};
use crate::sinks::telemetry::{ConnectionString, HttpTransport, TelemetryClient};
use crate::sinks::{ConsoleOptions, JobDashboard, SinkSpec, SinkTarget};

impl LoggerConfiguration {
    /// Applies `config` to this builder, resolving the log path for the
    /// configured environment on the running OS.
    pub fn configure(self, config: &Config) -> Result<Self, LoggingError> {
        let log_path = path::resolve_with_fallback(
            config.deploy_environment(),
            &config.log.file_name(),
            &config.log.path_table(),
        );
        self.configure_with_path(config, log_path)
    }

    /// Applies `config` using an already resolved log path.
    ///
    /// Binds the minimum level to the level switch, turns on context
    /// enrichment, then declares the sinks: console if enabled, exactly one
    /// file sink, and the job dashboard and telemetry sinks when their
    /// sections are enabled. The telemetry sink needs a running tokio
    /// runtime.
    ///
    /// The switch is left untouched: `log.level` is applied when the
    /// returned builder is activated, so a failure here or in activation
    /// keeps the live level.
    pub fn configure_with_path(
        self,
        config: &Config,
        log_path: LogPath,
    ) -> Result<Self, LoggingError> {
        let level = config.log.level()?;
        let switch = self.level_switch().clone();

        let mut configuration = self
            .controlled_by_switch()
            .switch_level(level)
            .enrich_from_log_context();

        println!("[configure] Using log path: {}", log_path);
        path::ensure_parent_dir(&log_path)?;

        if config.log.console {
            let console = ConsoleOptions {
                buffer_size: config.log.buffer_size,
                ..ConsoleOptions::default()
            };
            configuration = configuration
                .write_to(SinkSpec::new(SinkTarget::Console(console)).controlled_by(&switch));
        }

        configuration = configuration.write_to(
            SinkSpec::new(SinkTarget::File {
                path: log_path,
                options: config.log.file_options(),
            })
            .controlled_by(&switch),
        );

        if let Some(jobs) = config.job_dashboard() {
            let dashboard = JobDashboard::new(jobs.capacity);
            configuration = configuration.write_to_job_dashboard(dashboard, jobs.level()?);
            debug!(capacity = jobs.capacity, "job dashboard sink enabled");
        }

        if let Some(insights) = config.app_insights() {
            let telemetry_level = insights.level()?;
            let connection = ConnectionString::parse(&insights.connection_string)?;
            let transport = Arc::new(HttpTransport::new(&connection)?);
            // The worker exits once the last client clone is dropped.
            let (client, _worker) =
                TelemetryClient::start(&connection, transport, insights.telemetry_options())?;
            configuration = configuration.write_to_telemetry(client, telemetry_level);
            info!(endpoint = %connection.ingestion_endpoint, "telemetry sink enabled");
        }

        Ok(configuration)
    }
}
