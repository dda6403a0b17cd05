//! OrgScope Events - Audit Trail
//!
//! Audit records for committed hierarchy and planning mutations, the sinks
//! that receive them, and the identity provider that attributes them.
//!
//! Sinks:
//! - `TracingAuditSink`: structured log line under `orgscope::audit`
//! - `BroadcastAuditSink`: tokio broadcast channel for live subscribers
//! - `NoopAuditSink` and `FanoutAuditSink`

mod event;
mod identity;
mod sink;
mod trail;

pub use event::{AuditAction, AuditEvent};
pub use identity::{AnonymousIdentity, IdentityProvider, SessionIdentity};
pub use sink::{AuditSink, BroadcastAuditSink, FanoutAuditSink, NoopAuditSink, TracingAuditSink};
pub use trail::AuditTrail;
