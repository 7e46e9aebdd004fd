//! Logger builder and the live logger handle.
//!
//! # Lifecycle
//! ```text
//! build_bootstrap_logger(env)         verbose console + file, installed once
//!     → Logger (owned handle, passed down the startup sequence)
//!
//! Config loaded:
//!     logger.configuration()          builder sharing the logger's switch
//!     → .configure(&config)           level, enrichment, sink set
//!     → logger.reconfigure(builder)   sinks swapped in place
//! ```
//!
//! The global dispatcher is installed once and never replaced. It routes
//! every event through a reloadable sink stack, so reconfiguration swaps
//! sinks without a second global logger.

pub mod bootstrap;
pub mod context;
mod error;
mod runtime;

pub use bootstrap::{
    BootstrapOptions, bootstrap_configuration, build_bootstrap_logger, build_bootstrap_logger_with,
};
pub use error::LoggingError;

use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use tracing::Dispatch;
use tracing::dispatcher::DefaultGuard;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Registry, reload};

use crate::level::LevelSwitch;
use crate::path::LogPath;
use crate::sinks::{
    self, BoxedSink, ConsoleOptions, FileOptions, Gate, JobDashboard, SinkKind, SinkSpec,
    SinkTarget, TelemetryClient,
};

type SinkStack = Vec<BoxedSink>;

/// How the logger-wide minimum level is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Minimum {
    Fixed(LevelFilter),
    Switch,
}

/// Accumulates sinks and level settings; consumed once to produce or
/// reconfigure a [`Logger`].
#[derive(Debug, Clone)]
pub struct LoggerConfiguration {
    minimum: Minimum,
    switch: LevelSwitch,
    switch_level: Option<LevelFilter>,
    enrich_from_context: bool,
    sinks: Vec<SinkSpec>,
}

impl LoggerConfiguration {
    /// An empty builder with its own level switch.
    pub fn new() -> Self {
        Self::with_switch(LevelSwitch::default())
    }

    /// An empty builder bound to an existing switch.
    pub fn with_switch(switch: LevelSwitch) -> Self {
        Self {
            minimum: Minimum::Fixed(LevelFilter::INFO),
            switch,
            switch_level: None,
            enrich_from_context: false,
            sinks: Vec::new(),
        }
    }

    /// Fixes the logger-wide minimum level.
    pub fn minimum_level(mut self, level: impl Into<LevelFilter>) -> Self {
        self.minimum = Minimum::Fixed(level.into());
        self
    }

    /// Lets the builder's switch decide the logger-wide minimum level.
    pub fn controlled_by_switch(mut self) -> Self {
        self.minimum = Minimum::Switch;
        self
    }

    /// Level written to the switch once this builder is activated by
    /// [`create_logger`](Self::create_logger) or [`Logger::reconfigure`].
    pub fn switch_level(mut self, level: impl Into<LevelFilter>) -> Self {
        self.switch_level = Some(level.into());
        self
    }

    /// Copies fields of enclosing spans into structured sinks.
    pub fn enrich_from_log_context(mut self) -> Self {
        self.enrich_from_context = true;
        self
    }

    pub fn write_to(mut self, spec: SinkSpec) -> Self {
        self.sinks.push(spec);
        self
    }

    pub fn write_to_console(self, options: ConsoleOptions) -> Self {
        self.write_to(SinkSpec::new(SinkTarget::Console(options)))
    }

    pub fn write_to_file(self, path: LogPath, options: FileOptions) -> Self {
        self.write_to(SinkSpec::new(SinkTarget::File { path, options }))
    }

    pub fn write_to_job_dashboard(
        self,
        dashboard: JobDashboard,
        level: impl Into<LevelFilter>,
    ) -> Self {
        self.write_to(SinkSpec::new(SinkTarget::JobDashboard(dashboard)).restricted_to(level))
    }

    pub fn write_to_telemetry(
        self,
        client: TelemetryClient,
        level: impl Into<LevelFilter>,
    ) -> Self {
        self.write_to(SinkSpec::new(SinkTarget::Telemetry(client)).restricted_to(level))
    }

    pub fn level_switch(&self) -> &LevelSwitch {
        &self.switch
    }

    /// Level the switch will be set to on activation, if any.
    pub fn pending_level(&self) -> Option<LevelFilter> {
        self.switch_level
    }

    /// The minimum level this builder puts in effect once activated.
    pub fn effective_minimum(&self) -> LevelFilter {
        match self.minimum {
            Minimum::Fixed(level) => level,
            Minimum::Switch => self.switch_level.unwrap_or_else(|| self.switch.get()),
        }
    }

    pub fn is_controlled_by_switch(&self) -> bool {
        self.minimum == Minimum::Switch
    }

    pub fn enriches_from_context(&self) -> bool {
        self.enrich_from_context
    }

    pub fn sinks(&self) -> &[SinkSpec] {
        &self.sinks
    }

    pub fn sink_count(&self, kind: SinkKind) -> usize {
        self.sinks.iter().filter(|s| s.kind() == kind).count()
    }

    /// Builds a logger from this configuration. Nothing is installed.
    pub fn create_logger(self) -> Result<Logger, LoggingError> {
        let switch = self.switch.clone();
        let switch_level = self.switch_level;
        let built = self.build()?;
        if let Some(level) = switch_level {
            switch.set(level);
        }

        let (reload_layer, handle) = reload::Layer::new(built.stack);
        let dispatch = Dispatch::new(tracing_subscriber::registry().with(reload_layer));

        Ok(Logger {
            inner: Arc::new(LoggerInner {
                dispatch,
                handle,
                switch: RwLock::new(switch),
                guards: Mutex::new(built.guards),
                active: RwLock::new(built.active),
            }),
        })
    }

    fn base_gate(&self) -> Gate {
        match self.minimum {
            Minimum::Fixed(level) => Gate::fixed(level),
            Minimum::Switch => Gate::fixed(LevelFilter::TRACE).bind(&self.switch),
        }
    }

    fn build(self) -> Result<BuiltStack, LoggingError> {
        let base = self.base_gate();
        let mut built = BuiltStack::default();

        for spec in self.sinks {
            if let SinkTarget::JobDashboard(dashboard) = &spec.target {
                built.active.dashboard = Some(dashboard.clone());
            }
            let sink = sinks::build(spec, &base, self.enrich_from_context)?;
            built.active.kinds.push(sink.kind);
            built.stack.push(sink.layer);
            built.guards.extend(sink.guard);
        }
        Ok(built)
    }
}

impl Default for LoggerConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct BuiltStack {
    stack: SinkStack,
    guards: Vec<WorkerGuard>,
    active: ActiveSinks,
}

#[derive(Debug, Clone, Default)]
struct ActiveSinks {
    kinds: Vec<SinkKind>,
    dashboard: Option<JobDashboard>,
}

struct LoggerInner {
    dispatch: Dispatch,
    handle: reload::Handle<SinkStack, Registry>,
    switch: RwLock<LevelSwitch>,
    guards: Mutex<Vec<WorkerGuard>>,
    active: RwLock<ActiveSinks>,
}

/// Handle to a live logging pipeline.
///
/// Clones share the pipeline. Construct once at startup, install it with
/// [`Logger::install_global`], then pass the handle to whatever needs to
/// reconfigure it or change its level.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    pub fn dispatch(&self) -> &Dispatch {
        &self.inner.dispatch
    }

    /// The switch currently controlling this logger.
    pub fn level_switch(&self) -> LevelSwitch {
        self.inner
            .switch
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// A fresh builder sharing this logger's switch.
    pub fn configuration(&self) -> LoggerConfiguration {
        LoggerConfiguration::with_switch(self.level_switch())
    }

    /// Kinds of the sinks currently attached, in attachment order.
    pub fn active_sinks(&self) -> Vec<SinkKind> {
        self.inner
            .active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .kinds
            .clone()
    }

    /// The job dashboard fed by this logger, if one is attached.
    pub fn job_dashboard(&self) -> Option<JobDashboard> {
        self.inner
            .active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .dashboard
            .clone()
    }

    /// Replaces the sink set with the one described by `configuration`.
    ///
    /// Old sinks are swapped out first; their queues are flushed afterwards.
    /// The builder's pending level reaches the switch only once the new
    /// sinks are in place.
    pub fn reconfigure(&self, configuration: LoggerConfiguration) -> Result<(), LoggingError> {
        let switch = configuration.switch.clone();
        let switch_level = configuration.switch_level;
        let built = configuration.build()?;

        self.inner
            .handle
            .reload(built.stack)
            .map_err(|e| LoggingError::Reload(e.to_string()))?;
        if let Some(level) = switch_level {
            switch.set(level);
        }

        *self.inner.switch.write().unwrap_or_else(|e| e.into_inner()) = switch;
        *self.inner.active.write().unwrap_or_else(|e| e.into_inner()) = built.active;

        let old = {
            let mut guards = self.inner.guards.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *guards, built.guards)
        };
        drop(old);
        Ok(())
    }

    /// Installs this logger as the process-wide default, bridging `log`
    /// records as well. Succeeds once per process.
    pub fn install_global(&self) -> Result<(), LoggingError> {
        self.inner
            .dispatch
            .clone()
            .try_init()
            .map_err(|_| LoggingError::AlreadyInstalled)
    }

    /// Makes this logger the default for the current thread until the guard
    /// is dropped.
    pub fn set_default(&self) -> DefaultGuard {
        tracing::dispatcher::set_default(&self.inner.dispatch)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("switch", &self.level_switch())
            .field("sinks", &self.active_sinks())
            .finish()
    }
}

#[cfg(test)]
mod tests;
