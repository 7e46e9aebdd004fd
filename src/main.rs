use hostlog::config::{Config, ENVIRONMENT_VAR};
use hostlog::logger::context;
use hostlog::path;
use hostlog::watcher::ConfigWatcher;
use hostlog::{DeployEnvironment, Logger, LoggingError, build_bootstrap_logger};
use std::env;
use std::path::Path;
use tracing::{Instrument, error, info, warn};

const DEFAULT_CONFIG_PATH: &str = "configs/logging.yaml";

fn parse_config_path() -> String {
    for arg in env::args().skip(1) {
        if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    DEFAULT_CONFIG_PATH.to_string()
}

fn bootstrap_environment() -> DeployEnvironment {
    env::var(ENVIRONMENT_VAR)
        .ok()
        .and_then(|name| DeployEnvironment::from_name(&name))
        .unwrap_or(DeployEnvironment::Local)
}

/// Rebuilds the sink set from `config`, resolving the log path once.
async fn apply_config(logger: &Logger, config: &Config) -> Result<(), LoggingError> {
    let log_path = path::resolve_async(
        config.deploy_environment(),
        &config.log.file_name(),
        &config.log.path_table(),
    )
    .await;

    let configuration = logger.configuration().configure_with_path(config, log_path)?;
    logger.reconfigure(configuration)
}

/// Applies a reloaded configuration. A level-only change just moves the
/// switch; anything else rebuilds the sinks.
async fn apply_update(logger: &Logger, current: &mut Config, next: Config) {
    let mut same_except_level = current.clone();
    same_except_level.log.level = next.log.level.clone();

    if same_except_level == next {
        match next.log.level() {
            Ok(level) => {
                logger.level_switch().set(level);
                info!(level = %level, "log level updated");
            }
            Err(e) => error!(error = %e, "invalid log level in reloaded config"),
        }
    } else if let Err(e) = apply_config(logger, &next).await {
        error!(error = %e, "failed to apply reloaded config");
        return;
    } else {
        info!(sinks = ?logger.active_sinks(), "logger reconfigured");
    }

    *current = next;
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let logger = match build_bootstrap_logger(bootstrap_environment()) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Failed to start logging: {}", e);
            return;
        }
    };

    let config_path = parse_config_path();
    let mut config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!(config = %config_path, error = %e, "Failed to load config");
            return;
        }
    };

    if let Err(e) = apply_config(&logger, &config).await {
        error!(error = %e, "Failed to configure logging");
        return;
    }

    async {
        info!(config = %config_path, sinks = ?logger.active_sinks(), "Logging configured");
    }
    .instrument(context::correlation_span("startup"))
    .await;

    let (watcher, mut updates) = ConfigWatcher::new(Path::new(&config_path));
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            warn!(error = %e, "Config hot reload disabled");
            None
        }
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(next) = updates.recv() => apply_update(&logger, &mut config, next).await,
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }
}
