//! Field capture shared by the structured sinks.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::span;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

const MESSAGE_FIELD: &str = "message";

/// Key/value pairs recorded from an event or span, in recording order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    pub message: Option<String>,
    pub values: Vec<(String, String)>,
}

impl Fields {
    pub fn from_event(event: &Event<'_>) -> Self {
        let mut fields = Fields::default();
        event.record(&mut fields);
        fields
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, name: &str, value: String) {
        match self.values.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name.to_string(), value)),
        }
    }
}

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE_FIELD {
            self.message = Some(value.to_string());
        } else {
            self.set(field.name(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == MESSAGE_FIELD {
            self.message = Some(format!("{:?}", value));
        } else {
            self.set(field.name(), format!("{:?}", value));
        }
    }
}

/// Span fields stored in the registry's span extensions.
#[derive(Debug, Clone, Default)]
struct SpanFields(Fields);

pub(crate) fn store_span_fields<S>(
    attrs: &span::Attributes<'_>,
    id: &span::Id,
    ctx: &Context<'_, S>,
) where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let Some(span) = ctx.span(id) else {
        return;
    };
    let mut extensions = span.extensions_mut();
    // Another structured sink may already have recorded this span.
    if extensions.get_mut::<SpanFields>().is_some() {
        return;
    }
    let mut fields = Fields::default();
    attrs.record(&mut fields);
    extensions.insert(SpanFields(fields));
}

pub(crate) fn update_span_fields<S>(id: &span::Id, values: &span::Record<'_>, ctx: &Context<'_, S>)
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let Some(span) = ctx.span(id) else {
        return;
    };
    let mut extensions = span.extensions_mut();
    if let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() {
        values.record(fields);
    }
}

/// Fields of every span enclosing `event`, outermost first.
pub(crate) fn scope_fields<S>(event: &Event<'_>, ctx: &Context<'_, S>) -> Vec<(String, String)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let Some(scope) = ctx.event_scope(event) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for span in scope.from_root() {
        if let Some(SpanFields(fields)) = span.extensions().get::<SpanFields>() {
            out.extend(fields.values.iter().cloned());
        }
    }
    out
}
