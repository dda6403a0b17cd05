//! Cascading subtree deletion.
//!
//! Deleting a node removes every descendant with it. Discovery walks the
//! children collections level by level; nothing is written until the whole
//! subtree is known. The node, its descendants and any reference cleanup
//! contributed by registered cleaners then go out as one write batch, so
//! the delete either fully happens or not at all.

use std::sync::Arc;

use async_trait::async_trait;
use orgscope_core::{
    DocumentId, EntityType, Level, NodePath, NotFoundError, OrgResult, OrgScopeConfig,
    ValidationError,
};
use orgscope_events::{AuditAction, AuditTrail};
use orgscope_storage::{DocumentStore, WriteBatch};
use serde_json::json;
use tracing::{debug, info, warn};

/// Nodes about to be removed by a cascading delete.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovedSubtree {
    pub root: NodePath,
    /// Every removed path, deepest first, root last.
    pub paths: Vec<NodePath>,
}

impl RemovedSubtree {
    /// Ids of removed section (level 5) nodes.
    pub fn section_ids(&self) -> Vec<DocumentId> {
        self.paths
            .iter()
            .filter(|p| p.level() == Some(Level::SECTION))
            .filter_map(|p| p.id().map(str::to_string))
            .collect()
    }
}

/// Contributes extra writes to a cascading delete's batch, typically to
/// strip references to the removed nodes from other documents.
#[async_trait]
pub trait ReferenceCleaner: Send + Sync {
    async fn cleanup(&self, removed: &RemovedSubtree) -> OrgResult<WriteBatch>;
}

/// Outcome of a committed cascading delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteReport {
    pub root: NodePath,
    /// Removed paths, deepest first, root last.
    pub removed: Vec<NodePath>,
    pub removed_sections: Vec<DocumentId>,
    /// Operations contributed by reference cleaners.
    pub cleanup_ops: usize,
}

/// Deletes a node and all of its descendants in one batch.
#[derive(Clone)]
pub struct CascadeDeleter {
    store: Arc<dyn DocumentStore>,
    config: Arc<OrgScopeConfig>,
    cleaners: Vec<Arc<dyn ReferenceCleaner>>,
    audit: AuditTrail,
}

impl CascadeDeleter {
    pub fn new(store: Arc<dyn DocumentStore>, config: OrgScopeConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            cleaners: Vec::new(),
            audit: AuditTrail::default(),
        }
    }

    pub fn with_cleaner(mut self, cleaner: Arc<dyn ReferenceCleaner>) -> Self {
        self.cleaners.push(cleaner);
        self
    }

    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    /// Collect `path` and every descendant, deepest first.
    ///
    /// Read-only. Any read failure is returned as-is.
    pub async fn discover(&self, path: &NodePath) -> OrgResult<RemovedSubtree> {
        let level = path.level().ok_or_else(|| ValidationError::InvalidPath {
            path: path.to_string(),
            reason: "the org root cannot be deleted".to_string(),
        })?;
        if self.store.get(&path.to_string()).await?.is_none() {
            return Err(NotFoundError::new(EntityType::HierarchyNode, path.to_string()).into());
        }

        let mut by_level: Vec<Vec<NodePath>> = Vec::new();
        let mut frontier = vec![path.clone()];
        for child_level in level.deeper() {
            let mut next = Vec::new();
            for parent in &frontier {
                let Some(collection) = parent.child_collection() else {
                    continue;
                };
                for doc in self.store.list(&collection.to_string()).await? {
                    next.push(parent.child(doc.id())?);
                }
            }
            debug!(root = %path, level = %child_level, found = next.len(), "discovered descendants");
            if next.is_empty() {
                break;
            }
            by_level.push(next.clone());
            frontier = next;
        }

        let mut paths: Vec<NodePath> = by_level.into_iter().rev().flatten().collect();
        paths.push(path.clone());
        Ok(RemovedSubtree {
            root: path.clone(),
            paths,
        })
    }

    /// Delete `path` and its whole subtree.
    pub async fn delete_subtree(&self, path: &NodePath) -> OrgResult<DeleteReport> {
        let removed = self.discover(path).await?;

        let mut batch = WriteBatch::new();
        batch.require_exists(path.to_string());
        for p in &removed.paths {
            batch.delete(p.to_string());
        }

        let mut cleanup_ops = 0;
        for cleaner in &self.cleaners {
            let extra = cleaner.cleanup(&removed).await?;
            cleanup_ops += extra.len();
            batch.extend(extra);
        }

        if let Err(e) = batch.ensure_within(self.config.max_batch_operations) {
            warn!(root = %path, operations = batch.len(), "subtree too large to delete in one batch");
            return Err(e.into());
        }

        if let Err(e) = self.store.commit(batch).await {
            warn!(root = %path, error = %e, "cascading delete rejected, nothing removed");
            return Err(e);
        }

        let report = DeleteReport {
            root: path.clone(),
            removed_sections: removed.section_ids(),
            removed: removed.paths,
            cleanup_ops,
        };
        info!(
            root = %path,
            removed = report.removed.len(),
            sections = report.removed_sections.len(),
            cleanup_ops,
            "deleted subtree"
        );
        self.audit.record(
            AuditAction::SubtreeDeleted,
            EntityType::HierarchyNode,
            path.to_string(),
            json!({
                "removed": report.removed.len(),
                "removedSections": report.removed_sections,
                "cleanupOps": cleanup_ops,
            }),
        );
        Ok(report)
    }
}

impl std::fmt::Debug for CascadeDeleter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadeDeleter")
            .field("cleaners", &self.cleaners.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================
