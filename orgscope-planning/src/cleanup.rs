//! Strips assignments to deleted sections as part of a cascading delete.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use orgscope_core::OrgResult;
use orgscope_hierarchy::{ReferenceCleaner, RemovedSubtree};
use orgscope_storage::WriteBatch;
use tracing::debug;

use crate::record::scope_fields;
use crate::repository::PlanningGroupRepository;

/// Removes assignments pointing into a deleted subtree from every group of
/// the module. Each touched group is guarded by its read version, so a scope
/// commit racing the delete fails one side instead of resurrecting the
/// reference.
#[derive(Clone, Debug)]
pub struct PlanningReferenceCleaner {
    groups: PlanningGroupRepository,
    enabled: bool,
}

impl PlanningReferenceCleaner {
    /// Enabled according to `cleanup_group_references_on_delete`.
    pub fn new(groups: PlanningGroupRepository) -> Self {
        let enabled = groups.config().cleanup_group_references_on_delete;
        Self { groups, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl ReferenceCleaner for PlanningReferenceCleaner {
    async fn cleanup(&self, removed: &RemovedSubtree) -> OrgResult<WriteBatch> {
        let mut batch = WriteBatch::new();
        if !self.enabled {
            return Ok(batch);
        }
        let removed_ids: HashSet<String> = removed.section_ids().into_iter().collect();
        if removed_ids.is_empty() {
            return Ok(batch);
        }

        let now = Utc::now();
        for versioned in self.groups.list_versioned().await? {
            let group = versioned.group;
            if !group.section_ids().any(|id| removed_ids.contains(id)) {
                continue;
            }
            let kept: Vec<_> = group
                .assigned_sections
                .iter()
                .filter(|s| !removed_ids.contains(&s.l5_id))
                .cloned()
                .collect();
            debug!(
                group = %group.id,
                stripped = group.assigned_sections.len() - kept.len(),
                "stripping deleted sections from planning group"
            );
            let path = self.groups.group_path(&group.id);
            batch
                .require_version(path.clone(), versioned.version)
                .update(path, scope_fields(&kept, now)?);
        }
        Ok(batch)
    }
}
