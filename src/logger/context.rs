//! Spans that carry log context.
//!
//! Fields of these spans are copied into every event recorded inside them
//! when the logger enriches from context. Use `tracing::Instrument` to keep
//! the span across `.await` points.

use std::fmt::Display;

use tracing::{Span, info_span};

/// Span tagging events with a request correlation id.
pub fn correlation_span(correlation_id: impl Display) -> Span {
    info_span!("request", correlation_id = %correlation_id)
}

/// Span tagging events with a background job id, picked up by the job
/// dashboard.
pub fn job_span(job_id: impl Display) -> Span {
    info_span!("job", job_id = %job_id)
}
