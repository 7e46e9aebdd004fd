//! Level gate in front of a sink layer.

use std::cmp;

use tracing::level_filters::LevelFilter;
use tracing::span;
use tracing::subscriber::Interest;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::level::LevelSwitch;

/// Decides which event levels reach a sink.
///
/// An event passes when it is within `floor` and every bound switch.
#[derive(Debug, Clone)]
pub struct Gate {
    floor: LevelFilter,
    switches: Vec<LevelSwitch>,
}

impl Gate {
    pub fn fixed(floor: LevelFilter) -> Self {
        Self {
            floor,
            switches: Vec::new(),
        }
    }

    /// Narrows the floor; never widens it.
    pub fn restrict(mut self, level: LevelFilter) -> Self {
        self.floor = cmp::min(self.floor, level);
        self
    }

    pub fn bind(mut self, switch: &LevelSwitch) -> Self {
        if !self.switches.iter().any(|s| s.same_as(switch)) {
            self.switches.push(switch.clone());
        }
        self
    }

    pub fn allows(&self, level: &Level) -> bool {
        *level <= self.floor && self.switches.iter().all(|s| s.allows(level))
    }

    fn is_dynamic(&self) -> bool {
        !self.switches.is_empty()
    }
}

/// Forwards events to `inner` only when the gate allows their level.
///
/// Gating happens in `on_event`. Span callbacks always go through so span
/// fields stay available to the sink when it formats later events.
pub struct Gated<L> {
    inner: L,
    gate: Gate,
}

impl<L> Gated<L> {
    pub fn new(inner: L, gate: Gate) -> Self {
        Self { inner, gate }
    }
}

impl<S, L> Layer<S> for Gated<L>
where
    S: Subscriber,
    L: Layer<S>,
{
    fn on_layer(&mut self, subscriber: &mut S) {
        self.inner.on_layer(subscriber);
    }

    fn register_callsite(&self, metadata: &'static Metadata<'static>) -> Interest {
        let interest = self.inner.register_callsite(metadata);
        if interest.is_never() {
            return interest;
        }
        if metadata.is_event() && !self.gate.is_dynamic() && !self.gate.allows(metadata.level()) {
            return Interest::never();
        }
        Interest::sometimes()
    }

    // Not gated here: `enabled` is global across sibling sinks, so a closed
    // gate would silence every other sink too.
    fn enabled(&self, metadata: &Metadata<'_>, ctx: Context<'_, S>) -> bool {
        self.inner.enabled(metadata, ctx)
    }

    fn max_level_hint(&self) -> Option<LevelFilter> {
        if self.gate.is_dynamic() {
            None
        } else {
            Some(self.gate.floor)
        }
    }

    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        self.inner.on_new_span(attrs, id, ctx);
    }

    fn on_record(&self, span: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        self.inner.on_record(span, values, ctx);
    }

    fn on_follows_from(&self, span: &span::Id, follows: &span::Id, ctx: Context<'_, S>) {
        self.inner.on_follows_from(span, follows, ctx);
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if self.gate.allows(event.metadata().level()) {
            self.inner.on_event(event, ctx);
        }
    }

    fn on_enter(&self, id: &span::Id, ctx: Context<'_, S>) {
        self.inner.on_enter(id, ctx);
    }

    fn on_exit(&self, id: &span::Id, ctx: Context<'_, S>) {
        self.inner.on_exit(id, ctx);
    }

    fn on_close(&self, id: span::Id, ctx: Context<'_, S>) {
        self.inner.on_close(id, ctx);
    }

    fn on_id_change(&self, old: &span::Id, new: &span::Id, ctx: Context<'_, S>) {
        self.inner.on_id_change(old, new, ctx);
    }
}
