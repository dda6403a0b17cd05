//! Audit event types.

use chrono::{DateTime, Utc};
use orgscope_core::EntityType;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Mutation recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum AuditAction {
    NodeCreated,
    NodeUpdated,
    SubtreeDeleted,
    GroupCreated,
    GroupUpdated,
    GroupDeleted,
    ScopeCommitted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::NodeCreated => "node_created",
            AuditAction::NodeUpdated => "node_updated",
            AuditAction::SubtreeDeleted => "subtree_deleted",
            AuditAction::GroupCreated => "group_created",
            AuditAction::GroupUpdated => "group_updated",
            AuditAction::GroupDeleted => "group_deleted",
            AuditAction::ScopeCommitted => "scope_committed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record. Emitted after a mutation has been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AuditEvent {
    pub id: Uuid,
    pub action: AuditAction,
    pub entity_type: EntityType,
    /// Path or id of the affected entity.
    pub entity_id: String,
    pub actor: Option<String>,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(action: AuditAction, entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            action,
            entity_type,
            entity_id: entity_id.into(),
            actor: None,
            at: Utc::now(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_builder() {
        let event = AuditEvent::new(
            AuditAction::SubtreeDeleted,
            EntityType::HierarchyNode,
            "org/level_1/A",
        )
        .with_actor(Some("planner@plant".to_string()))
        .with_details(json!({"removed": 3}));

        assert_eq!(event.actor.as_deref(), Some("planner@plant"));
        assert_eq!(event.details["removed"], 3);
        assert_eq!(event.id.get_version_num(), 7);
    }

    #[test]
    fn test_event_serializes_snake_case_action() {
        let event = AuditEvent::new(AuditAction::ScopeCommitted, EntityType::PlanningGroup, "g1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["action"], "scope_committed");
        assert_eq!(json["entityId"], "g1");
    }
}
