//! Node repository.
//!
//! CRUD over hierarchy nodes stored at their ancestry paths. Children of a
//! node at level `k` live in the collection `{path}/level_{k+1}`; the
//! level-1 collection hangs directly off the org root.

use std::sync::Arc;

use chrono::Utc;
use orgscope_core::{
    new_document_id, ConflictError, EntityType, HierarchyNode, Level, NewNode, NodePath,
    NodeUpdate, NotFoundError, OrgError, OrgResult, OrgScopeConfig, StorageError,
    ValidationError,
};
use orgscope_events::{AuditAction, AuditTrail};
use orgscope_storage::{DocumentStore, WriteBatch};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::record::{node_body, node_from_document};

/// Repository for hierarchy nodes.
#[derive(Clone)]
pub struct NodeRepository {
    store: Arc<dyn DocumentStore>,
    config: Arc<OrgScopeConfig>,
    audit: AuditTrail,
}

impl NodeRepository {
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

    /// Children of `parent` at `level`, sorted by name then id.
    ///
    /// This is the unit of lazy expansion: one call per expanded node.
    /// A level past 7 yields an empty list; a level that is not the
    /// parent's depth plus one is rejected.
    pub async fn list_children(
        &self,
        parent: &NodePath,
        level: u8,
    ) -> OrgResult<Vec<HierarchyNode>> {
        if level > Level::MAX {
            return Ok(Vec::new());
        }
        let level = Level::new(level)?;
        let collection = child_collection(parent, level)?;
        self.require_parent(parent).await?;

        let docs = self.store.list(&collection).await?;
        let mut children = docs
            .iter()
            .map(node_from_document)
            .collect::<OrgResult<Vec<_>>>()?;
        children.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        debug!(parent = %parent, level = %level, count = children.len(), "listed children");
        Ok(children)
    }

    /// Create a node under `parent` at `level`.
    pub async fn create_node(
        &self,
        parent: &NodePath,
        level: u8,
        input: NewNode,
    ) -> OrgResult<HierarchyNode> {
        let level = Level::new(level)?;
        child_collection(parent, level)?;
        let input = input.validate(level)?;
        self.require_parent(parent).await?;

        if self.config.strict_sibling_codes {
            self.check_sibling_code(parent, level, &input.code, None)
                .await?;
        }

        let now = Utc::now();
        let path = parent.child(new_document_id())?;
        let node = HierarchyNode {
            id: path.id().unwrap_or_default().to_string(),
            name: input.name,
            code: input.code,
            level,
            path,
            section_type: input.section_type,
            asset_type: input.asset_type,
            created_at: now,
            updated_at: now,
        };

        let mut batch = WriteBatch::new();
        if !parent.is_root() {
            batch.require_exists(parent.to_string());
        }
        batch.create(node.path.to_string(), node_body(&node)?);

        self.store.commit(batch).await.map_err(|e| match e {
            OrgError::Storage(StorageError::PreconditionFailed { ref path, .. })
                if *path == parent.to_string() =>
            {
                NotFoundError::new(EntityType::HierarchyNode, parent.to_string()).into()
            }
            other => other,
        })?;

        info!(path = %node.path, level = %level, name = %node.name, "created node");
        self.audit.record(
            AuditAction::NodeCreated,
            EntityType::HierarchyNode,
            node.path.to_string(),
            json!({ "name": node.name, "code": node.code, "level": level.get() }),
        );
        Ok(node)
    }

    /// Update name, code or classification flags. Level and path never change.
    pub async fn update_node(&self, path: &NodePath, update: NodeUpdate) -> OrgResult<HierarchyNode> {
        let doc = self.load(path).await?;
        let mut node = node_from_document(&doc)?;
        if update.is_empty() {
            return Ok(node);
        }

        update.apply_to(&mut node)?;
        if self.config.strict_sibling_codes && update.code.is_some() {
            if let Some(parent) = path.parent() {
                self.check_sibling_code(&parent, node.level, &node.code, Some(&node.id))
                    .await?;
            }
        }
        node.updated_at = Utc::now();

        let mut batch = WriteBatch::new();
        batch
            .require_version(doc.path.clone(), doc.version)
            .set(doc.path.clone(), node_body(&node)?);
        self.store.commit(batch).await.map_err(|e| match e {
            OrgError::Storage(StorageError::PreconditionFailed { .. }) => {
                warn!(path = %path, "node changed or vanished during update");
                ConflictError::ConcurrentModification {
                    entity_type: EntityType::HierarchyNode,
                    id: path.to_string(),
                }
                .into()
            }
            other => other,
        })?;

        info!(path = %path, "updated node");
        self.audit.record(
            AuditAction::NodeUpdated,
            EntityType::HierarchyNode,
            path.to_string(),
            json!({ "name": node.name, "code": node.code }),
        );
        Ok(node)
    }

    pub async fn get_node(&self, path: &NodePath) -> OrgResult<HierarchyNode> {
        let doc = self.load(path).await?;
        node_from_document(&doc)
    }

    /// Like [`get_node`](Self::get_node) but `None` when absent.
    pub async fn find_node(&self, path: &NodePath) -> OrgResult<Option<HierarchyNode>> {
        if path.is_root() {
            return Ok(None);
        }
        match self.store.get(&path.to_string()).await? {
            Some(doc) => Ok(Some(node_from_document(&doc)?)),
            None => Ok(None),
        }
    }

    /// Every ancestor of `path`, level 1 first. Fails if any is missing.
    pub async fn ancestors(&self, path: &NodePath) -> OrgResult<Vec<HierarchyNode>> {
        let mut nodes = Vec::with_capacity(path.depth() as usize);
        for ancestor in path.ancestors() {
            nodes.push(self.get_node(&ancestor).await?);
        }
        Ok(nodes)
    }

    async fn load(&self, path: &NodePath) -> OrgResult<orgscope_storage::Document> {
        if path.is_root() {
            return Err(ValidationError::InvalidPath {
                path: path.to_string(),
                reason: "the org root is not a node".to_string(),
            }
            .into());
        }
        self.store
            .get(&path.to_string())
            .await?
            .ok_or_else(|| NotFoundError::new(EntityType::HierarchyNode, path.to_string()).into())
    }

    async fn require_parent(&self, parent: &NodePath) -> OrgResult<()> {
        if parent.is_root() {
            return Ok(());
        }
        self.load(parent).await.map(|_| ())
    }

    async fn check_sibling_code(
        &self,
        parent: &NodePath,
        level: Level,
        code: &str,
        except_id: Option<&str>,
    ) -> OrgResult<()> {
        let collection = child_collection(parent, level)?;
        for doc in self.store.list(&collection).await? {
            let sibling = node_from_document(&doc)?;
            if Some(sibling.id.as_str()) != except_id && sibling.code.eq_ignore_ascii_case(code) {
                return Err(ConflictError::DuplicateSiblingCode {
                    code: code.to_string(),
                    parent: parent.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for NodeRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRepository")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Collection string for the children of `parent` at `level`.
fn child_collection(parent: &NodePath, level: Level) -> Result<String, ValidationError> {
    let expected = parent.depth() + 1;
    if level.get() != expected {
        return Err(ValidationError::LevelMismatch {
            expected,
            got: level.get(),
        });
    }
    parent
        .child_collection()
        .map(|c| c.to_string())
        .ok_or(ValidationError::LevelOutOfRange { level: expected })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use orgscope_core::{AssetType, SectionType};
    use orgscope_events::AuditTrail;
    use orgscope_test_utils::assertions::{assert_not_found, assert_validation_error};
    use orgscope_test_utils::{init_test_tracing, InMemoryDocumentStore, RecordingAuditSink};
    use orgscope_events::AnonymousIdentity;

    fn repo() -> NodeRepository {
        init_test_tracing();
        NodeRepository::new(Arc::new(InMemoryDocumentStore::new()), OrgScopeConfig::default())
    }

    async fn chain(repo: &NodeRepository, depth: u8) -> Vec<HierarchyNode> {
        let mut parent = NodePath::root();
        let mut nodes = Vec::new();
        for level in 1..=depth {
            let node = repo
                .create_node(&parent, level, NewNode::new(format!("N{}", level), format!("C{}", level)))
                .await
                .unwrap();
            parent = node.path.clone();
            nodes.push(node);
        }
        nodes
    }

    #[tokio::test]
    async fn test_create_and_list_under_root() {
        let repo = repo();
        let plant = repo
            .create_node(&NodePath::root(), 1, NewNode::new("Plant A", "PA"))
            .await
            .unwrap();
        assert_eq!(plant.level, Level::COMPANY);
        assert_eq!(plant.path.depth(), 1);

        let roots = repo.list_children(&NodePath::root(), 1).await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name, "Plant A");
    }

    #[tokio::test]
    async fn test_list_children_sorted_by_name() {
        let repo = repo();
        for name in ["Zeta", "Alpha", "Mid"] {
            repo.create_node(&NodePath::root(), 1, NewNode::new(name, "X"))
                .await
                .unwrap();
        }
        let names: Vec<String> = repo
            .list_children(&NodePath::root(), 1)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Mid", "Zeta"]);
    }

    #[tokio::test]
    async fn test_list_children_of_leaf_is_empty() {
        let repo = repo();
        let nodes = chain(&repo, 2).await;
        let children = repo.list_children(&nodes[1].path, 3).await.unwrap();
        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn test_list_children_missing_parent() {
        let repo = repo();
        let missing = NodePath::from_ids(["nope"]).unwrap();
        assert_not_found(&repo.list_children(&missing, 2).await, EntityType::HierarchyNode);
    }

    #[tokio::test]
    async fn test_list_children_level_eight_is_empty() {
        let repo = repo();
        let nodes = chain(&repo, 7).await;
        let children = repo.list_children(&nodes[6].path, 8).await.unwrap();
        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn test_list_children_level_mismatch() {
        let repo = repo();
        let nodes = chain(&repo, 1).await;
        assert_validation_error(&repo.list_children(&nodes[0].path, 3).await);
    }

    #[tokio::test]
    async fn test_create_at_level_eight_fails() {
        let repo = repo();
        let nodes = chain(&repo, 7).await;
        let result = repo
            .create_node(&nodes[6].path, 8, NewNode::new("Too deep", "TD"))
            .await;
        assert!(matches!(
            result,
            Err(OrgError::Validation(ValidationError::LevelOutOfRange { level: 8 }))
        ));
    }

    #[tokio::test]
    async fn test_create_with_wrong_level_fails() {
        let repo = repo();
        let nodes = chain(&repo, 1).await;
        let result = repo
            .create_node(&nodes[0].path, 3, NewNode::new("Skip", "SK"))
            .await;
        assert!(matches!(
            result,
            Err(OrgError::Validation(ValidationError::LevelMismatch { expected: 2, got: 3 }))
        ));
    }

    #[tokio::test]
    async fn test_create_under_missing_parent() {
        let repo = repo();
        let missing = NodePath::from_ids(["ghost"]).unwrap();
        let result = repo.create_node(&missing, 2, NewNode::new("Line", "L")).await;
        assert_not_found(&result, EntityType::HierarchyNode);
    }

    #[tokio::test]
    async fn test_create_requires_name_and_code() {
        let repo = repo();
        assert_validation_error(
            &repo
                .create_node(&NodePath::root(), 1, NewNode::new(" ", "C"))
                .await,
        );
        assert_validation_error(
            &repo
                .create_node(&NodePath::root(), 1, NewNode::new("Plant", ""))
                .await,
        );
    }

    #[tokio::test]
    async fn test_flags_only_on_their_levels() {
        let repo = repo();
        let nodes = chain(&repo, 4).await;
        let section = repo
            .create_node(
                &nodes[3].path,
                5,
                NewNode::new("Stores", "ST").with_section_type(SectionType::InventoryWarehouse),
            )
            .await
            .unwrap();
        assert!(section.is_inventory_warehouse());

        let bad = repo
            .create_node(
                &section.path,
                6,
                NewNode::new("Pump", "P1").with_section_type(SectionType::Utility),
            )
            .await;
        assert_validation_error(&bad);

        let asset = repo
            .create_node(
                &section.path,
                6,
                NewNode::new("Pump", "P1").with_asset_type(AssetType::Machine),
            )
            .await
            .unwrap();
        assert_eq!(asset.asset_type, Some(AssetType::Machine));
    }

    #[tokio::test]
    async fn test_sibling_codes_advisory_by_default() {
        let repo = repo();
        repo.create_node(&NodePath::root(), 1, NewNode::new("A", "DUP"))
            .await
            .unwrap();
        assert!(repo
            .create_node(&NodePath::root(), 1, NewNode::new("B", "DUP"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_strict_sibling_codes() {
        let config = OrgScopeConfig {
            strict_sibling_codes: true,
            ..Default::default()
        };
        let repo = NodeRepository::new(Arc::new(InMemoryDocumentStore::new()), config);
        repo.create_node(&NodePath::root(), 1, NewNode::new("A", "DUP"))
            .await
            .unwrap();
        let result = repo
            .create_node(&NodePath::root(), 1, NewNode::new("B", "dup"))
            .await;
        assert!(matches!(
            result,
            Err(OrgError::Conflict(ConflictError::DuplicateSiblingCode { .. }))
        ));
    }

    #[tokio::test]
    async fn test_update_node() {
        let repo = repo();
        let nodes = chain(&repo, 2).await;
        let updated = repo
            .update_node(
                &nodes[1].path,
                NodeUpdate {
                    name: Some("Line 9".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Line 9");
        assert_eq!(updated.path, nodes[1].path);
        assert_eq!(repo.get_node(&nodes[1].path).await.unwrap().name, "Line 9");
    }

    #[tokio::test]
    async fn test_update_missing_node() {
        let repo = repo();
        let missing = NodePath::from_ids(["x"]).unwrap();
        let result = repo
            .update_node(
                &missing,
                NodeUpdate {
                    name: Some("Y".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert_not_found(&result, EntityType::HierarchyNode);
    }

    #[tokio::test]
    async fn test_get_root_is_rejected() {
        let repo = repo();
        assert_validation_error(&repo.get_node(&NodePath::root()).await);
        assert!(repo.find_node(&NodePath::root()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ancestors() {
        let repo = repo();
        let nodes = chain(&repo, 4).await;
        let ancestors = repo.ancestors(&nodes[3].path).await.unwrap();
        let levels: Vec<u8> = ancestors.iter().map(|n| n.level.get()).collect();
        assert_eq!(levels, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_mutations_are_audited() {
        let sink = RecordingAuditSink::new();
        let repo = repo().with_audit(AuditTrail::new(
            Arc::new(sink.clone()),
            Arc::new(AnonymousIdentity),
        ));
        let nodes = chain(&repo, 2).await;
        repo.update_node(
            &nodes[0].path,
            NodeUpdate {
                code: Some("NEW".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(sink.len(), 3);
    }
}
