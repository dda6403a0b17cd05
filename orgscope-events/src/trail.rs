//! Audit trail used by the repositories.

use crate::{
    AnonymousIdentity, AuditAction, AuditEvent, AuditSink, IdentityProvider, NoopAuditSink,
    TracingAuditSink,
};
use orgscope_core::EntityType;
use std::sync::Arc;

/// Stamps events with the current actor and hands them to a sink.
#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
    identity: Arc<dyn IdentityProvider>,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { sink, identity }
    }

    /// Anonymous actor, events logged through tracing.
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingAuditSink), Arc::new(AnonymousIdentity))
    }

    /// Records nothing.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopAuditSink), Arc::new(AnonymousIdentity))
    }

    pub fn actor(&self) -> Option<String> {
        self.identity.current_actor()
    }

    /// Record a committed mutation.
    pub fn record(
        &self,
        action: AuditAction,
        entity_type: EntityType,
        entity_id: impl Into<String>,
        details: serde_json::Value,
    ) {
        let event = AuditEvent::new(action, entity_type, entity_id)
            .with_actor(self.identity.current_actor())
            .with_details(details);
        self.sink.record(&event);
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::tracing()
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("actor", &self.identity.current_actor())
            .finish_non_exhaustive()
    }
}
