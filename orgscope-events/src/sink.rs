//! Audit sinks.
//!
//! Recording is fire-and-forget: a sink never blocks the caller and never
//! reports failure back, so an audit problem cannot roll back a mutation
//! that has already been committed.

use crate::AuditEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Logs every event under the `orgscope::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        info!(
            target: "orgscope::audit",
            action = %event.action,
            entity_type = %event.entity_type,
            entity_id = %event.entity_id,
            actor = event.actor.as_deref().unwrap_or("anonymous"),
            details = %event.details,
            "audit"
        );
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Fans events out to subscribers over a tokio broadcast channel.
///
/// Slow subscribers lag and miss events; the sender never waits.
#[derive(Debug, Clone)]
pub struct BroadcastAuditSink {
    tx: broadcast::Sender<AuditEvent>,
}

impl BroadcastAuditSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl AuditSink for BroadcastAuditSink {
    fn record(&self, event: &AuditEvent) {
        match self.tx.send(event.clone()) {
            Ok(receivers) => {
                debug!(action = %event.action, receivers, "broadcast audit event");
            }
            Err(_) => {
                debug!(action = %event.action, "no subscribers for audit event");
            }
        }
    }
}

/// Forwards each event to every inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, event: &AuditEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}
