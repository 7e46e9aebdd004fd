//! Telemetry sink shipping events to an Application Insights ingestion
//! endpoint.
//!
//! Events become message envelopes on a bounded queue; a tokio worker sends
//! them in batches through a [`TelemetryTransport`]. A full queue drops
//! events rather than blocking the caller.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::span;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use super::fields::{self, Fields};
use crate::logger::LoggingError;

const DEFAULT_INGESTION_ENDPOINT: &str = "https://dc.services.visualstudio.com";
const TRACK_PATH: &str = "/v2/track";
const MESSAGE_ENVELOPE: &str = "Microsoft.ApplicationInsights.Message";
const MESSAGE_BASE_TYPE: &str = "MessageData";
const OPERATION_ID_TAG: &str = "ai.operation.id";
const CORRELATION_FIELD: &str = "correlation_id";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Telemetry errors.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),
    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ingestion endpoint returned status {0}")]
    Status(u16),
}

/// Parsed `InstrumentationKey=...;IngestionEndpoint=...` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub instrumentation_key: String,
    pub ingestion_endpoint: String,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self, TelemetryError> {
        let mut key = None;
        let mut endpoint = None;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = part.split_once('=').ok_or_else(|| {
                TelemetryError::InvalidConnectionString(format!("malformed segment: {}", part))
            })?;
            match name.trim().to_ascii_lowercase().as_str() {
                "instrumentationkey" => key = Some(value.trim().to_string()),
                "ingestionendpoint" => {
                    endpoint = Some(value.trim().trim_end_matches('/').to_string())
                }
                _ => {}
            }
        }

        let instrumentation_key = key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                TelemetryError::InvalidConnectionString("InstrumentationKey is required".into())
            })?;

        Ok(Self {
            instrumentation_key,
            ingestion_endpoint: endpoint.unwrap_or_else(|| DEFAULT_INGESTION_ENDPOINT.to_string()),
        })
    }

    pub fn track_url(&self) -> String {
        format!("{}{}", self.ingestion_endpoint, TRACK_PATH)
    }
}

/// Application Insights envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub name: String,
    pub time: String,
    pub i_key: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    pub data: EnvelopeData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeData {
    pub base_type: String,
    pub base_data: MessageData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    pub ver: u8,
    pub message: String,
    pub severity_level: u8,
    pub properties: BTreeMap<String, String>,
}

impl Envelope {
    pub fn message(
        instrumentation_key: &str,
        level: &Level,
        message: String,
        properties: BTreeMap<String, String>,
        time: DateTime<Utc>,
    ) -> Self {
        let mut tags = BTreeMap::new();
        if let Some(id) = properties.get(CORRELATION_FIELD) {
            tags.insert(OPERATION_ID_TAG.to_string(), id.clone());
        }

        Self {
            name: MESSAGE_ENVELOPE.to_string(),
            time: time.to_rfc3339_opts(SecondsFormat::Micros, true),
            i_key: instrumentation_key.to_string(),
            tags,
            data: EnvelopeData {
                base_type: MESSAGE_BASE_TYPE.to_string(),
                base_data: MessageData {
                    ver: 2,
                    message,
                    severity_level: severity_level(level),
                    properties,
                },
            },
        }
    }
}

/// Maps a tracing level onto the ingestion severity scale (0 verbose to 3
/// error; 4 critical is never produced).
pub fn severity_level(level: &Level) -> u8 {
    match *level {
        Level::TRACE | Level::DEBUG => 0,
        Level::INFO => 1,
        Level::WARN => 2,
        Level::ERROR => 3,
    }
}

/// Sends batches of envelopes somewhere.
#[async_trait]
pub trait TelemetryTransport: Send + Sync {
    async fn send(&self, batch: Vec<Envelope>) -> Result<(), TelemetryError>;
}

/// Posts batches as a JSON array to `<IngestionEndpoint>/v2/track`.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(connection: &ConnectionString) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: connection.track_url(),
        })
    }
}

#[async_trait]
impl TelemetryTransport for HttpTransport {
    async fn send(&self, batch: Vec<Envelope>) -> Result<(), TelemetryError> {
        let body = serde_json::to_vec(&batch)?;
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Queue and batching limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryOptions {
    pub queue_size: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            queue_size: 1000,
            batch_size: 100,
            flush_interval: Duration::from_secs(5),
        }
    }
}

/// Producer side of the telemetry queue.
#[derive(Clone)]
pub struct TelemetryClient {
    instrumentation_key: String,
    sender: mpsc::Sender<Envelope>,
    dropped: Arc<AtomicU64>,
}

impl TelemetryClient {
    /// Spawns the batching worker on the current tokio runtime.
    ///
    /// The worker drains the queue and exits once every client clone is
    /// dropped; the returned handle resolves at that point.
    pub fn start(
        connection: &ConnectionString,
        transport: Arc<dyn TelemetryTransport>,
        options: TelemetryOptions,
    ) -> Result<(Self, JoinHandle<()>), LoggingError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LoggingError::NoRuntime)?;
        let (sender, receiver) = mpsc::channel(options.queue_size.max(1));
        let worker = runtime.spawn(run_worker(receiver, transport, options));

        let client = Self {
            instrumentation_key: connection.instrumentation_key.clone(),
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        Ok((client, worker))
    }

    /// Queues an envelope, dropping it if the queue is full.
    pub fn enqueue(&self, envelope: Envelope) {
        if self.sender.try_send(envelope).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of envelopes dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<Envelope>,
    transport: Arc<dyn TelemetryTransport>,
    options: TelemetryOptions,
) {
    let batch_size = options.batch_size.max(1);
    let mut batch = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(options.flush_interval.max(MIN_FLUSH_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Some(envelope) => {
                    batch.push(envelope);
                    if batch.len() >= batch_size {
                        flush(transport.as_ref(), &mut batch).await;
                    }
                }
                None => {
                    flush(transport.as_ref(), &mut batch).await;
                    break;
                }
            },
            _ = ticker.tick() => flush(transport.as_ref(), &mut batch).await,
        }
    }
}

async fn flush(transport: &dyn TelemetryTransport, batch: &mut Vec<Envelope>) {
    if batch.is_empty() {
        return;
    }
    let items = std::mem::take(batch);
    let count = items.len();
    // Not logged through tracing: this sink would receive its own failures.
    if let Err(e) = transport.send(items).await {
        eprintln!("[telemetry] failed to send {} items: {}", count, e);
    }
}

/// Layer converting events into envelopes.
pub struct TelemetryLayer {
    client: TelemetryClient,
    enrich: bool,
}

impl TelemetryLayer {
    pub fn new(client: TelemetryClient, enrich: bool) -> Self {
        Self { client, enrich }
    }
}

impl<S> Layer<S> for TelemetryLayer
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
        let metadata = event.metadata();
        let event_fields = Fields::from_event(event);

        let mut properties = BTreeMap::new();
        if self.enrich {
            properties.extend(fields::scope_fields(event, &ctx));
        }
        properties.extend(event_fields.values);
        properties.insert("target".to_string(), metadata.target().to_string());

        self.client.enqueue(Envelope::message(
            &self.client.instrumentation_key,
            metadata.level(),
            event_fields.message.unwrap_or_default(),
            properties,
            Utc::now(),
        ));
    }
}
