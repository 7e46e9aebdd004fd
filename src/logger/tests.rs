//! Tests for the logger builder, runtime configuration and bootstrap.

use super::*;
use crate::config::{AppInsightsConfig, AzureConfig, Config, JobDashboardConfig};
use crate::environment::DeployEnvironment;
use crate::level::LogLevel;
use crate::path::{LogFileName, LogPathTable, RootDirs, TargetOs};
use std::fs;
use tempfile::TempDir;
use tracing::{debug, info, warn};

const CONNECTION_STRING: &str = "InstrumentationKey=test-key;IngestionEndpoint=http://127.0.0.1:9";

fn log_path_in(dir: &TempDir) -> LogPath {
    LogPath::rooted(&dir.path().to_string_lossy(), &LogFileName::fixed(), TargetOs::current())
}

fn config_from(yaml: &str) -> Config {
    Config::from_yaml(yaml).unwrap()
}

fn with_dashboard(mut config: Config, level: &str) -> Config {
    config.hangfire = Some(JobDashboardConfig {
        enabled: true,
        level: Some(level.to_string()),
        capacity: 100,
    });
    config
}

fn with_telemetry(mut config: Config) -> Config {
    config.azure = Some(AzureConfig {
        app_insights: Some(AppInsightsConfig {
            enable: true,
            level: None,
            connection_string: CONNECTION_STRING.to_string(),
            queue_size: 10,
            batch_size: 10,
            flush_interval: std::time::Duration::from_secs(60),
        }),
    });
    config
}

fn files_in(dir: &TempDir) -> Vec<String> {
    fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect()
}

// ==================== Runtime configuration ====================

#[test]
fn test_configure_without_console_writes_file_only() {
    let dir = TempDir::new().unwrap();
    let cfg = LoggerConfiguration::new()
        .configure_with_path(&config_from("log:\n  console: false\n"), log_path_in(&dir))
        .unwrap();

    assert_eq!(cfg.sink_count(SinkKind::Console), 0);
    assert_eq!(cfg.sink_count(SinkKind::File), 1);
    assert_eq!(cfg.sinks().len(), 1);
}

#[test]
fn test_configure_console_absent_means_file_only() {
    let dir = TempDir::new().unwrap();
    let cfg = LoggerConfiguration::new()
        .configure_with_path(&Config::default(), log_path_in(&dir))
        .unwrap();

    assert_eq!(cfg.sink_count(SinkKind::Console), 0);
    assert_eq!(cfg.sink_count(SinkKind::File), 1);
}

#[test]
fn test_configure_with_console_writes_console_and_file() {
    let dir = TempDir::new().unwrap();
    let cfg = LoggerConfiguration::new()
        .configure_with_path(&config_from("log:\n  console: true\n"), log_path_in(&dir))
        .unwrap();

    let kinds: Vec<SinkKind> = cfg.sinks().iter().map(|s| s.kind()).collect();
    assert_eq!(kinds, vec![SinkKind::Console, SinkKind::File]);
}

#[test]
fn test_configure_binds_sinks_to_switch_and_enriches() {
    let dir = TempDir::new().unwrap();
    let config = config_from("log:\n  console: true\n  level: warning\n");
    let cfg = LoggerConfiguration::new()
        .configure_with_path(&config, log_path_in(&dir))
        .unwrap();

    assert!(cfg.is_controlled_by_switch());
    assert!(cfg.enriches_from_context());
    assert_eq!(cfg.pending_level(), Some(LevelFilter::WARN));
    assert_eq!(cfg.effective_minimum(), LevelFilter::WARN);
    assert_eq!(cfg.level_switch().get(), LevelFilter::INFO);
    for sink in cfg.sinks() {
        let switch = sink.level_switch.as_ref().unwrap();
        assert!(switch.same_as(cfg.level_switch()));
    }
}

#[test]
fn test_configure_level_defaults_to_information() {
    let dir = TempDir::new().unwrap();
    let cfg = LoggerConfiguration::new()
        .minimum_level(LevelFilter::TRACE)
        .configure_with_path(&Config::default(), log_path_in(&dir))
        .unwrap();

    assert_eq!(cfg.effective_minimum(), LogLevel::Information.as_filter());
}

#[test]
fn test_configure_rejects_unknown_level() {
    let dir = TempDir::new().unwrap();
    let config = config_from("log:\n  level: chatty\n");
    let result = LoggerConfiguration::new().configure_with_path(&config, log_path_in(&dir));

    assert!(matches!(result, Err(LoggingError::Config(_))));
}

#[test]
fn test_configure_creates_missing_log_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a").join("b");
    let path = LogPath::rooted(
        &nested.to_string_lossy(),
        &LogFileName::fixed(),
        TargetOs::current(),
    );

    LoggerConfiguration::new()
        .configure_with_path(&Config::default(), path)
        .unwrap();

    assert!(nested.is_dir());
}

#[test]
fn test_configure_resolves_path_from_table() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_string_lossy().to_string();
    let mut config = config_from("environment: Production\n");
    config.log.paths.insert("production".to_string(), RootDirs::new(root.clone(), root));

    let cfg = LoggerConfiguration::new().configure(&config).unwrap();

    match &cfg.sinks()[0].target {
        SinkTarget::File { path, .. } => {
            assert_eq!(path.as_path().parent(), Some(dir.path()));
        }
        other => panic!("expected file sink, got {:?}", other),
    }
}

#[test]
fn test_configure_adds_job_dashboard_when_enabled() {
    let dir = TempDir::new().unwrap();
    let cfg = LoggerConfiguration::new()
        .configure_with_path(&with_dashboard(Config::default(), "warning"), log_path_in(&dir))
        .unwrap();

    assert_eq!(cfg.sink_count(SinkKind::JobDashboard), 1);
    let dashboard = cfg
        .sinks()
        .iter()
        .find(|s| s.kind() == SinkKind::JobDashboard)
        .unwrap();
    assert_eq!(dashboard.restricted_to, LevelFilter::WARN);
}

#[test]
fn test_configure_telemetry_requires_runtime() {
    let dir = TempDir::new().unwrap();
    let config = with_telemetry(Config::default());
    let result = LoggerConfiguration::new().configure_with_path(&config, log_path_in(&dir));

    assert!(matches!(result, Err(LoggingError::NoRuntime)));
}

#[tokio::test]
async fn test_configure_adds_telemetry_inside_runtime() {
    let dir = TempDir::new().unwrap();
    let cfg = LoggerConfiguration::new()
        .configure_with_path(&with_telemetry(Config::default()), log_path_in(&dir))
        .unwrap();

    assert_eq!(cfg.sink_count(SinkKind::Telemetry), 1);
    let telemetry = cfg.sinks().iter().find(|s| s.kind() == SinkKind::Telemetry).unwrap();
    assert_eq!(telemetry.restricted_to, LevelFilter::WARN);
}

// ==================== Live logger ====================

#[test]
fn test_failed_configure_keeps_live_level() {
    let dir = TempDir::new().unwrap();
    let logger = LoggerConfiguration::new()
        .configure_with_path(&config_from("log:\n  level: warning\n"), log_path_in(&dir))
        .unwrap()
        .create_logger()
        .unwrap();
    assert_eq!(logger.level_switch().get(), LevelFilter::WARN);

    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, "file").unwrap();
    let unreachable = LogPath::rooted(
        &blocker.to_string_lossy(),
        &LogFileName::fixed(),
        TargetOs::current(),
    );

    let result = logger
        .configuration()
        .configure_with_path(&config_from("log:\n  level: verbose\n"), unreachable);

    assert!(matches!(result, Err(LoggingError::Io(_))));
    assert_eq!(logger.level_switch().get(), LevelFilter::WARN);
}

#[test]
fn test_level_applies_on_reconfigure() {
    let dir = TempDir::new().unwrap();
    let logger = LoggerConfiguration::new()
        .configure_with_path(&config_from("log:\n  level: warning\n"), log_path_in(&dir))
        .unwrap()
        .create_logger()
        .unwrap();

    let configuration = logger
        .configuration()
        .configure_with_path(&config_from("log:\n  level: debug\n"), log_path_in(&dir))
        .unwrap();
    assert_eq!(logger.level_switch().get(), LevelFilter::WARN);

    logger.reconfigure(configuration).unwrap();
    assert_eq!(logger.level_switch().get(), LevelFilter::DEBUG);
}


#[test]
fn test_switch_changes_filtering_without_rebuild() {
    let dir = TempDir::new().unwrap();
    let config = with_dashboard(config_from("log:\n  level: warning\n"), "verbose");
    let logger = LoggerConfiguration::new()
        .configure_with_path(&config, log_path_in(&dir))
        .unwrap()
        .create_logger()
        .unwrap();
    let dashboard = logger.job_dashboard().unwrap();

    {
        let _guard = logger.set_default();
        info!("hidden");
        warn!("shown");
        logger.level_switch().set(LogLevel::Debug);
        debug!("now shown");
    }

    let messages: Vec<String> = dashboard.entries().into_iter().map(|e| e.message).collect();
    assert_eq!(messages, vec!["shown", "now shown"]);
}

#[test]
fn test_reconfigure_swaps_sinks_and_keeps_switch() {
    let dir = TempDir::new().unwrap();
    let first = JobDashboard::new(10);
    let logger = LoggerConfiguration::new()
        .minimum_level(LevelFilter::TRACE)
        .write_to_job_dashboard(first.clone(), LevelFilter::TRACE)
        .create_logger()
        .unwrap();
    let switch = logger.level_switch();
    let _guard = logger.set_default();

    info!("before");

    let config = with_dashboard(config_from("log:\n  level: debug\n"), "verbose");
    let configuration = logger
        .configuration()
        .configure_with_path(&config, log_path_in(&dir))
        .unwrap();
    logger.reconfigure(configuration).unwrap();

    info!("after");

    assert_eq!(logger.active_sinks(), vec![SinkKind::File, SinkKind::JobDashboard]);
    assert!(logger.level_switch().same_as(&switch));
    assert_eq!(switch.get(), LevelFilter::DEBUG);

    let second = logger.job_dashboard().unwrap();
    let old: Vec<String> = first.entries().into_iter().map(|e| e.message).collect();
    let new: Vec<String> = second.entries().into_iter().map(|e| e.message).collect();
    assert_eq!(old, vec!["before"]);
    assert_eq!(new, vec!["after"]);
}

#[test]
fn test_context_spans_enrich_dashboard_entries() {
    let dir = TempDir::new().unwrap();
    let logger = LoggerConfiguration::new()
        .configure_with_path(&with_dashboard(Config::default(), "information"), log_path_in(&dir))
        .unwrap()
        .create_logger()
        .unwrap();
    let dashboard = logger.job_dashboard().unwrap();

    {
        let _guard = logger.set_default();
        let request = context::correlation_span("req-7");
        let _request = request.enter();
        context::job_span(42).in_scope(|| info!("processing"));
    }

    let entries = dashboard.entries_for("42");
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].fields,
        vec![
            ("correlation_id".to_string(), "req-7".to_string()),
            ("job_id".to_string(), "42".to_string())
        ]
    );
}

#[test]
fn test_file_sink_receives_events() {
    let dir = TempDir::new().unwrap();
    let logger = LoggerConfiguration::new()
        .configure_with_path(&Config::default(), log_path_in(&dir))
        .unwrap()
        .create_logger()
        .unwrap();

    {
        let _guard = logger.set_default();
        info!(user = "ann", "signed in");
    }

    let files = files_in(&dir);
    assert_eq!(files.len(), 1);
    let content = fs::read_to_string(dir.path().join(&files[0])).unwrap();
    assert!(content.contains("signed in"));
    assert!(content.contains("user=\"ann\""));
}

// ==================== Bootstrap ====================

fn bootstrap_options(dir: &TempDir) -> BootstrapOptions {
    let root = dir.path().to_string_lossy().to_string();
    BootstrapOptions {
        table: LogPathTable::empty()
            .with_root(DeployEnvironment::Development, RootDirs::new(root.clone(), root)),
        ..BootstrapOptions::default()
    }
}

#[test]
fn test_bootstrap_configuration_is_verbose_console_and_file() {
    let dir = TempDir::new().unwrap();
    let cfg =
        bootstrap_configuration(Some(DeployEnvironment::Development), &bootstrap_options(&dir))
            .unwrap();

    assert_eq!(cfg.effective_minimum(), LevelFilter::TRACE);
    assert_eq!(cfg.pending_level(), Some(LevelFilter::TRACE));
    assert!(!cfg.is_controlled_by_switch());
    let kinds: Vec<SinkKind> = cfg.sinks().iter().map(|s| s.kind()).collect();
    assert_eq!(kinds, vec![SinkKind::Console, SinkKind::File]);
}

#[test]
fn test_bootstrap_opens_log_file_under_root() {
    let dir = TempDir::new().unwrap();
    let options = bootstrap_options(&dir);
    let logger = bootstrap_configuration(Some(DeployEnvironment::Development), &options)
        .unwrap()
        .create_logger()
        .unwrap();

    assert_eq!(logger.active_sinks(), vec![SinkKind::Console, SinkKind::File]);
    let files = files_in(&dir);
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("log") && files[0].ends_with(".log"));
}

#[test]
fn test_bootstrap_creates_missing_log_directory() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("app");
    let options = BootstrapOptions {
        file_name: LogFileName::new("app/log.log"),
        ..bootstrap_options(&dir)
    };
    assert!(!nested.exists());

    let logger = bootstrap_configuration(Some(DeployEnvironment::Development), &options)
        .unwrap()
        .create_logger()
        .unwrap();

    assert!(nested.is_dir());
    assert_eq!(logger.active_sinks(), vec![SinkKind::Console, SinkKind::File]);
    let files: Vec<String> = fs::read_dir(&nested)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("log") && files[0].ends_with(".log"));
}

#[test]
fn test_bootstrap_delete_existing_and_probe() {
    let dir = TempDir::new().unwrap();
    let stale = dir.path().join("log.log");
    fs::write(&stale, "previous run").unwrap();

    let options = BootstrapOptions {
        delete_existing: true,
        probe: true,
        ..bootstrap_options(&dir)
    };
    bootstrap_configuration(Some(DeployEnvironment::Development), &options).unwrap();

    assert!(!stale.exists());
    assert!(!dir.path().join(".write-probe").exists());
}

#[test]
fn test_install_global_succeeds_once() {
    let dir = TempDir::new().unwrap();
    let logger =
        build_bootstrap_logger_with(DeployEnvironment::Development, &bootstrap_options(&dir))
            .unwrap();

    assert!(matches!(logger.install_global(), Err(LoggingError::AlreadyInstalled)));
    assert!(matches!(
        build_bootstrap_logger_with(DeployEnvironment::Development, &bootstrap_options(&dir)),
        Err(LoggingError::AlreadyInstalled)
    ));
}
