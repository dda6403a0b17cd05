//! Planning group repository.
//!
//! Groups live in one collection per planning module. Code uniqueness is a
//! read-before-write pre-check: two sessions creating the same code at the
//! same moment can both pass it.

use std::sync::Arc;

use chrono::Utc;
use orgscope_core::{
    new_document_id, validate_document_id, ConflictError, EntityType, GroupUpdate,
    NewPlanningGroup, NotFoundError, OrgError, OrgResult, OrgScopeConfig, PlanningGroup,
    SectionAssignment, StorageError,
};
use orgscope_events::{AuditAction, AuditTrail};
use orgscope_storage::{DocumentStore, Sequence, WriteBatch};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::record::{group_body, group_from_document, VersionedGroup};

const CODE_PREFIX: &str = "PG";
const CODE_WIDTH: usize = 4;
const CODE_SEQUENCE: &str = "planningGroups";

/// Whether an assignment still points at an existing section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Live,
    Deleted,
}

/// An assignment checked against the current tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAssignment {
    pub assignment: SectionAssignment,
    pub status: AssignmentStatus,
    /// Current section name when it differs from the stored one.
    pub current_name: Option<String>,
}

/// Repository for planning groups of one module.
#[derive(Clone)]
pub struct PlanningGroupRepository {
    store: Arc<dyn DocumentStore>,
    config: Arc<OrgScopeConfig>,
    audit: AuditTrail,
}

impl PlanningGroupRepository {
    pub fn new(store: Arc<dyn DocumentStore>, config: OrgScopeConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            audit: AuditTrail::default(),
        }
    }

    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &OrgScopeConfig {
        &self.config
    }

    pub(crate) fn group_path(&self, id: &str) -> String {
        format!("{}/{}", self.config.planning_groups_collection(), id)
    }

    /// Create a group with a caller-chosen code.
    pub async fn create(&self, input: NewPlanningGroup) -> OrgResult<PlanningGroup> {
        let input = input.validate()?;
        self.ensure_code_free(&input.code, None).await?;

        let now = Utc::now();
        let group = PlanningGroup {
            id: new_document_id(),
            code: input.code,
            name: input.name,
            description: input.description,
            assigned_sections: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let mut batch = WriteBatch::new();
        batch.create(self.group_path(&group.id), group_body(&group)?);
        self.store.commit(batch).await?;

        info!(id = %group.id, code = %group.code, "created planning group");
        self.audit.record(
            AuditAction::GroupCreated,
            EntityType::PlanningGroup,
            group.id.clone(),
            json!({ "code": group.code, "name": group.name }),
        );
        Ok(group)
    }

    /// Create a group whose code comes from the module counter (`PG-0001`).
    ///
    /// Counter values already taken by hand-entered codes are skipped.
    pub async fn create_with_generated_code(
        &self,
        name: &str,
        description: &str,
    ) -> OrgResult<PlanningGroup> {
        let sequence = Sequence::new(
            self.store.clone(),
            &self.config.counters_collection(),
            CODE_SEQUENCE,
            self.config.sequence_max_retries,
        );

        for _ in 0..self.config.sequence_max_retries.max(1) {
            let code = sequence.next_code(CODE_PREFIX, CODE_WIDTH).await?;
            if self.find_by_code(&code).await?.is_some() {
                debug!(code = %code, "generated code already taken, drawing again");
                continue;
            }
            return self
                .create(NewPlanningGroup::new(code, name).with_description(description))
                .await;
        }

        Err(ConflictError::ConcurrentModification {
            entity_type: EntityType::Sequence,
            id: sequence.path().to_string(),
        }
        .into())
    }

    pub async fn get(&self, id: &str) -> OrgResult<PlanningGroup> {
        Ok(self.get_versioned(id).await?.group)
    }

    /// Every group in the module, sorted by code then id.
    pub async fn list(&self) -> OrgResult<Vec<PlanningGroup>> {
        Ok(self
            .list_versioned()
            .await?
            .into_iter()
            .map(|v| v.group)
            .collect())
    }

    /// Group with exactly `code`, if any.
    pub async fn find_by_code(&self, code: &str) -> OrgResult<Option<PlanningGroup>> {
        let code = code.trim();
        Ok(self
            .list_versioned()
            .await?
            .into_iter()
            .map(|v| v.group)
            .find(|g| g.code == code))
    }

    /// Update code, name or description.
    pub async fn update(&self, id: &str, update: GroupUpdate) -> OrgResult<PlanningGroup> {
        let VersionedGroup { mut group, version } = self.get_versioned(id).await?;
        if update.is_empty() {
            return Ok(group);
        }

        let previous_code = group.code.clone();
        update.apply_to(&mut group)?;
        if group.code != previous_code {
            self.ensure_code_free(&group.code, Some(id)).await?;
        }
        group.updated_at = Utc::now();

        let path = self.group_path(id);
        let mut batch = WriteBatch::new();
        batch
            .require_version(path.clone(), version)
            .set(path, group_body(&group)?);
        self.store
            .commit(batch)
            .await
            .map_err(|e| concurrent_on_precondition(e, id))?;

        info!(id = %id, code = %group.code, "updated planning group");
        self.audit.record(
            AuditAction::GroupUpdated,
            EntityType::PlanningGroup,
            id.to_string(),
            json!({ "code": group.code, "name": group.name }),
        );
        Ok(group)
    }

    /// Delete a group, releasing every section it claimed.
    pub async fn delete(&self, id: &str) -> OrgResult<()> {
        let existing = self.get(id).await?;
        let path = self.group_path(id);

        let mut batch = WriteBatch::new();
        batch.require_exists(path.clone()).delete(path);
        self.store.commit(batch).await.map_err(|e| match e {
            OrgError::Storage(StorageError::PreconditionFailed { .. }) => {
                NotFoundError::new(EntityType::PlanningGroup, id).into()
            }
            other => other,
        })?;

        info!(id = %id, code = %existing.code, "deleted planning group");
        self.audit.record(
            AuditAction::GroupDeleted,
            EntityType::PlanningGroup,
            id.to_string(),
            json!({ "code": existing.code, "releasedSections": existing.assigned_sections.len() }),
        );
        Ok(())
    }

    /// Check each of a group's assignments against the current tree.
    pub async fn resolve_assignments(&self, id: &str) -> OrgResult<Vec<ResolvedAssignment>> {
        let group = self.get(id).await?;
        let mut resolved = Vec::with_capacity(group.assigned_sections.len());
        for assignment in group.assigned_sections {
            let section = self.store.get(&assignment.path).await?;
            let (status, current_name) = match section {
                Some(doc) => {
                    let name = doc
                        .data
                        .get("name")
                        .and_then(|v| v.as_str())
                        .filter(|n| *n != assignment.l5_name)
                        .map(str::to_string);
                    (AssignmentStatus::Live, name)
                }
                None => (AssignmentStatus::Deleted, None),
            };
            resolved.push(ResolvedAssignment {
                assignment,
                status,
                current_name,
            });
        }

        let stale = resolved
            .iter()
            .filter(|r| r.status == AssignmentStatus::Deleted)
            .count();
        if stale > 0 {
            warn!(id = %id, stale, "planning group references deleted sections");
        }
        Ok(resolved)
    }

    pub(crate) async fn get_versioned(&self, id: &str) -> OrgResult<VersionedGroup> {
        validate_document_id(id)?;
        let doc = self
            .store
            .get(&self.group_path(id))
            .await?
            .ok_or_else(|| OrgError::from(NotFoundError::new(EntityType::PlanningGroup, id)))?;
        group_from_document(&doc)
    }

    pub(crate) async fn list_versioned(&self) -> OrgResult<Vec<VersionedGroup>> {
        let docs = self
            .store
            .list(&self.config.planning_groups_collection())
            .await?;
        let mut groups = docs
            .iter()
            .map(group_from_document)
            .collect::<OrgResult<Vec<_>>>()?;
        groups.sort_by(|a, b| {
            a.group
                .code
                .cmp(&b.group.code)
                .then_with(|| a.group.id.cmp(&b.group.id))
        });
        debug!(count = groups.len(), "listed planning groups");
        Ok(groups)
    }

    async fn ensure_code_free(&self, code: &str, except_id: Option<&str>) -> OrgResult<()> {
        if let Some(existing) = self.find_by_code(code).await? {
            if Some(existing.id.as_str()) != except_id {
                return Err(ConflictError::DuplicateCode {
                    code: code.to_string(),
                    existing_id: existing.id,
                }
                .into());
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for PlanningGroupRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanningGroupRepository")
            .field("collection", &self.config.planning_groups_collection())
            .finish_non_exhaustive()
    }
}

/// Map a failed version precondition to a concurrent-modification conflict.
pub(crate) fn concurrent_on_precondition(error: OrgError, id: &str) -> OrgError {
    match error {
        OrgError::Storage(StorageError::PreconditionFailed { path, reason }) => {
            warn!(id = %id, path = %path, reason = %reason, "planning group changed concurrently");
            ConflictError::ConcurrentModification {
                entity_type: EntityType::PlanningGroup,
                id: id.to_string(),
            }
            .into()
        }
        other => other,
    }
}

// ============================================================================
// TESTS
// ============================================================================
