//! Sink definitions and their construction into tracing layers.
//!
//! A [`SinkSpec`] is a description kept by the logger builder; [`build`]
//! turns it into a level-gated layer plus the worker guard of any
//! non-blocking queue it owns.

pub mod fields;
pub mod gate;
pub mod job_dashboard;
pub mod rolling;
pub mod telemetry;

pub use gate::{Gate, Gated};
pub use job_dashboard::{JobDashboard, JobDashboardLayer, JobLogEntry};
pub use rolling::{RollingFileWriter, RollingOptions};
pub use telemetry::{TelemetryClient, TelemetryLayer};

use std::fmt;
use std::io;
use std::sync::Mutex;

use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::{Layer, Registry, fmt as tfmt};

use crate::level::LevelSwitch;
use crate::logger::LoggingError;
use crate::path::LogPath;

/// Default capacity of the non-blocking queues, in lines.
pub const DEFAULT_BUFFER_SIZE: usize = 10_000;

/// Type-erased sink layer as stored in the live logger.
pub type BoxedSink = Box<dyn Layer<Registry> + Send + Sync>;

/// How the file sink reaches the disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileWriteMode {
    /// Written on the calling thread; never drops events.
    #[default]
    Synchronous,
    /// Written by a background thread through a bounded queue that blocks
    /// callers when full; never drops events.
    Buffered,
}

/// Kind of sink, for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Console,
    File,
    JobDashboard,
    Telemetry,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SinkKind::Console => "console",
            SinkKind::File => "file",
            SinkKind::JobDashboard => "job_dashboard",
            SinkKind::Telemetry => "telemetry",
        };
        f.write_str(name)
    }
}

/// Console sink settings.
#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    pub buffer_size: usize,
    pub ansi: bool,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            ansi: true,
        }
    }
}

/// File sink settings.
#[derive(Debug, Clone, Default)]
pub struct FileOptions {
    pub write_mode: FileWriteMode,
    pub rolling: RollingOptions,
    pub buffer_size: Option<usize>,
}

/// Where a sink writes.
#[derive(Clone)]
pub enum SinkTarget {
    Console(ConsoleOptions),
    File { path: LogPath, options: FileOptions },
    JobDashboard(JobDashboard),
    Telemetry(TelemetryClient),
}

impl fmt::Debug for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkTarget::Console(options) => f.debug_tuple("Console").field(options).finish(),
            SinkTarget::File { path, options } => f
                .debug_struct("File")
                .field("path", path)
                .field("options", options)
                .finish(),
            SinkTarget::JobDashboard(d) => {
                f.debug_tuple("JobDashboard").field(&d.capacity()).finish()
            }
            SinkTarget::Telemetry(_) => f.write_str("Telemetry"),
        }
    }
}

/// One sink as declared on the builder.
#[derive(Debug, Clone)]
pub struct SinkSpec {
    pub target: SinkTarget,
    /// Most verbose level this sink accepts.
    pub restricted_to: LevelFilter,
    /// Switch bound to this sink, if any.
    pub level_switch: Option<LevelSwitch>,
}

impl SinkSpec {
    pub fn new(target: SinkTarget) -> Self {
        Self {
            target,
            restricted_to: LevelFilter::TRACE,
            level_switch: None,
        }
    }

    pub fn restricted_to(mut self, level: impl Into<LevelFilter>) -> Self {
        self.restricted_to = level.into();
        self
    }

    pub fn controlled_by(mut self, switch: &LevelSwitch) -> Self {
        self.level_switch = Some(switch.clone());
        self
    }

    pub fn kind(&self) -> SinkKind {
        match self.target {
            SinkTarget::Console(_) => SinkKind::Console,
            SinkTarget::File { .. } => SinkKind::File,
            SinkTarget::JobDashboard(_) => SinkKind::JobDashboard,
            SinkTarget::Telemetry(_) => SinkKind::Telemetry,
        }
    }

    fn gate(&self, base: &Gate) -> Gate {
        let gate = base.clone().restrict(self.restricted_to);
        match &self.level_switch {
            Some(switch) => gate.bind(switch),
            None => gate,
        }
    }
}

/// A constructed sink.
pub struct BuiltSink {
    pub kind: SinkKind,
    pub layer: BoxedSink,
    pub guard: Option<WorkerGuard>,
}

/// Builds a sink layer.
///
/// `base` carries the logger-wide minimum; `enrich` copies span fields into
/// structured sinks. Formatted sinks always render the span scope.
pub fn build(spec: SinkSpec, base: &Gate, enrich: bool) -> Result<BuiltSink, LoggingError> {
    let gate = spec.gate(base);
    let kind = spec.kind();

    let (layer, guard): (BoxedSink, Option<WorkerGuard>) = match spec.target {
        SinkTarget::Console(options) => {
            let (writer, guard) = NonBlockingBuilder::default()
                .lossy(true)
                .buffered_lines_limit(options.buffer_size.max(1))
                .thread_name("hostlog-console")
                .finish(io::stdout());
            let layer = tfmt::layer::<Registry>()
                .with_writer(writer)
                .with_ansi(options.ansi)
                .with_target(true);
            (Box::new(Gated::new(layer, gate)), Some(guard))
        }
        SinkTarget::File { path, options } => {
            let writer = RollingFileWriter::new(&path, options.rolling)?;
            match options.write_mode {
                FileWriteMode::Synchronous => {
                    let layer = tfmt::layer::<Registry>()
                        .with_writer(Mutex::new(writer))
                        .with_ansi(false)
                        .with_target(true);
                    (Box::new(Gated::new(layer, gate)), None)
                }
                FileWriteMode::Buffered => {
                    let limit = options.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE).max(1);
                    let (writer, guard) = NonBlockingBuilder::default()
                        .lossy(false)
                        .buffered_lines_limit(limit)
                        .thread_name("hostlog-file")
                        .finish(writer);
                    let layer = tfmt::layer::<Registry>()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true);
                    (Box::new(Gated::new(layer, gate)), Some(guard))
                }
            }
        }
        SinkTarget::JobDashboard(dashboard) => {
            let layer = JobDashboardLayer::new(dashboard, enrich);
            (Box::new(Gated::new(layer, gate)), None)
        }
        SinkTarget::Telemetry(client) => {
            let layer = TelemetryLayer::new(client, enrich);
            (Box::new(Gated::new(layer, gate)), None)
        }
    };

    Ok(BuiltSink { kind, layer, guard })
}
