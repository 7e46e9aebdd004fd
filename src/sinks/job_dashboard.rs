//! In-memory sink feeding a background-job dashboard.
//!
//! Events are kept in a bounded ring together with the `job_id` of the job
//! they were logged from, taken from the event itself or an enclosing span
//! (see [`crate::logger::context::job_span`]).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::span;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use super::fields::{self, Fields};

const JOB_ID_FIELD: &str = "job_id";

/// Default number of entries kept.
pub const DEFAULT_CAPACITY: usize = 1000;

/// One captured event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub target: String,
    pub message: String,
    pub job_id: Option<String>,
    pub fields: Vec<(String, String)>,
}

/// Shared handle to the captured entries.
#[derive(Debug, Clone)]
pub struct JobDashboard {
    entries: Arc<Mutex<VecDeque<JobLogEntry>>>,
    capacity: usize,
}

impl JobDashboard {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<JobLogEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Entries logged from the given job, oldest first.
    pub fn entries_for(&self, job_id: &str) -> Vec<JobLogEntry> {
        self.lock()
            .iter()
            .filter(|e| e.job_id.as_deref() == Some(job_id))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn push(&self, entry: JobLogEntry) {
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<JobLogEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for JobDashboard {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Layer writing into a [`JobDashboard`].
pub struct JobDashboardLayer {
    dashboard: JobDashboard,
    enrich: bool,
}

impl JobDashboardLayer {
    /// With `enrich`, span fields are copied into each entry's fields.
    pub fn new(dashboard: JobDashboard, enrich: bool) -> Self {
        Self { dashboard, enrich }
    }
}

impl<S> Layer<S> for JobDashboardLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        fields::store_span_fields(attrs, id, &ctx);
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        fields::update_span_fields(id, values, &ctx);
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let event_fields = Fields::from_event(event);
        let scope = fields::scope_fields(event, &ctx);

        let job_id = event_fields
            .get(JOB_ID_FIELD)
            .map(str::to_string)
            .or_else(|| {
                scope
                    .iter()
                    .rev()
                    .find(|(k, _)| k == JOB_ID_FIELD)
                    .map(|(_, v)| v.clone())
            });

        let mut values = if self.enrich { scope } else { Vec::new() };
        values.extend(event_fields.values);

        let metadata = event.metadata();
        self.dashboard.push(JobLogEntry {
            timestamp: Utc::now(),
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: event_fields.message.unwrap_or_default(),
            job_id,
            fields: values,
        });
    }
}
