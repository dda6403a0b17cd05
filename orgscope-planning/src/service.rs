//! Wiring of repositories, the delete engine and the scope engine over one
//! shared store.

use std::sync::Arc;

use orgscope_core::{ConfigError, OrgResult, OrgScopeConfig};
use orgscope_events::{
    AuditTrail, BroadcastAuditSink, FanoutAuditSink, IdentityProvider, TracingAuditSink,
};
use orgscope_hierarchy::{CascadeDeleter, NodeRepository};
use orgscope_storage::DocumentStore;
use tracing::info;

use crate::cleanup::PlanningReferenceCleaner;
use crate::repository::PlanningGroupRepository;
use crate::scope::ScopeEngine;

/// Everything a presentation layer needs, sharing one store and audit trail.
#[derive(Clone, Debug)]
pub struct OrgScope {
    pub nodes: NodeRepository,
    pub groups: PlanningGroupRepository,
    /// Cascading delete with planning references stripped in the same batch.
    pub deleter: CascadeDeleter,
    pub scope: ScopeEngine,
    pub config: Arc<OrgScopeConfig>,
}

impl OrgScope {
    /// Validate `config` and wire every component over `store`.
    ///
    /// `max_batch_operations` may not exceed the store's own cap, so a
    /// delete the config admits is never refused by the store.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        config: OrgScopeConfig,
        audit: AuditTrail,
    ) -> OrgResult<Self> {
        config.validate()?;
        if config.max_batch_operations > store.max_batch_operations() {
            return Err(ConfigError::InvalidValue {
                field: "max_batch_operations".to_string(),
                value: config.max_batch_operations.to_string(),
                reason: format!(
                    "store accepts at most {} operations per batch",
                    store.max_batch_operations()
                ),
            }
            .into());
        }

        let nodes = NodeRepository::new(store.clone(), config.clone()).with_audit(audit.clone());
        let groups =
            PlanningGroupRepository::new(store.clone(), config.clone()).with_audit(audit.clone());
        let cleaner = PlanningReferenceCleaner::new(groups.clone());
        let deleter = CascadeDeleter::new(store, config.clone())
            .with_cleaner(Arc::new(cleaner))
            .with_audit(audit.clone());
        let scope = ScopeEngine::new(groups.clone(), nodes.clone(), &config).with_audit(audit);

        info!(
            module = %config.planning_module,
            commit_mode = %config.scope_commit_mode,
            cleanup = config.cleanup_group_references_on_delete,
            "org scope services ready"
        );
        Ok(Self {
            nodes,
            groups,
            deleter,
            scope,
            config: Arc::new(config),
        })
    }

    /// Like [`new`](Self::new), with audit events both logged and broadcast
    /// on a channel of `audit_channel_capacity`. Returns the broadcast sink
    /// so callers can subscribe.
    pub fn with_live_audit(
        store: Arc<dyn DocumentStore>,
        config: OrgScopeConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> OrgResult<(Self, BroadcastAuditSink)> {
        config.validate()?;
        let broadcast = BroadcastAuditSink::new(config.audit_channel_capacity);
        let sink = FanoutAuditSink::new()
            .with(Arc::new(TracingAuditSink))
            .with(Arc::new(broadcast.clone()));
        let org = Self::new(store, config, AuditTrail::new(Arc::new(sink), identity))?;
        Ok((org, broadcast))
    }
}
