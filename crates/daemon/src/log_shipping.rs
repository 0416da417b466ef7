// SPDX-License-Identifier: MIT

//! Best-effort remote log sink: a bounded in-memory queue of formatted log
//! lines, drained on an interval and POSTed to `log_shipping.endpoint` if
//! configured. Never blocks the tracing call site — `try_send` drops the
//! line on a full queue rather than waiting — and flush failures are logged
//! at `warn!` and the batch discarded, the same non-blocking backpressure
//! rule the fan-out applies to its own slow consumers.

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, serde::Serialize)]
struct ShippedLine {
    level: String,
    target: String,
    message: String,
    timestamp_ms: u64,
}

pub struct LogShippingLayer {
    tx: mpsc::Sender<ShippedLine>,
}

impl LogShippingLayer {
    /// Spawns the background flusher. With no endpoint configured the queue
    /// is still drained (never discarded to backpressure) so tracing's
    /// `on_event` call site never blocks regardless of configuration.
    pub fn new(endpoint: Option<String>, batch_size: usize, flush_interval_ms: u64) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        match endpoint {
            Some(endpoint) => {
                tokio::spawn(run_flusher(endpoint, rx, batch_size.max(1), flush_interval_ms.max(1)));
            }
            None => {
                tokio::spawn(drain_forever(rx));
            }
        }
        Self { tx }
    }
}

impl<S: Subscriber> Layer<S> for LogShippingLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let timestamp_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0);
        let line = ShippedLine { level: event.metadata().level().to_string(), target: event.metadata().target().to_string(), message: visitor.message, timestamp_ms };
        let _ = self.tx.try_send(line);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

async fn drain_forever(mut rx: mpsc::Receiver<ShippedLine>) {
    while rx.recv().await.is_some() {}
}

async fn run_flusher(endpoint: String, mut rx: mpsc::Receiver<ShippedLine>, batch_size: usize, flush_interval_ms: u64) {
    let client = reqwest::Client::new();
    let mut batch = Vec::with_capacity(batch_size);
    let mut interval = tokio::time::interval(std::time::Duration::from_millis(flush_interval_ms));

    loop {
        tokio::select! {
            maybe_line = rx.recv() => {
                match maybe_line {
                    Some(line) => {
                        batch.push(line);
                        if batch.len() >= batch_size {
                            flush(&client, &endpoint, &mut batch).await;
                        }
                    }
                    None => {
                        flush(&client, &endpoint, &mut batch).await;
                        break;
                    }
                }
            }
            _ = interval.tick() => {
                flush(&client, &endpoint, &mut batch).await;
            }
        }
    }
}

async fn flush(client: &reqwest::Client, endpoint: &str, batch: &mut Vec<ShippedLine>) {
    if batch.is_empty() {
        return;
    }
    let payload = std::mem::take(batch);
    if let Err(e) = client.post(endpoint).json(&payload).send().await {
        tracing::warn!(error = %e, "log shipping flush failed");
    }
}
