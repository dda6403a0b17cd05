//! Persisted node body.

use chrono::{DateTime, Utc};
use orgscope_core::{
    AssetType, HierarchyNode, NodePath, OrgResult, SectionType, StorageError, ValidationError,
};
use orgscope_storage::{encode_body, Document};
use serde::{Deserialize, Serialize};

/// Node fields stored in the document body. Id, level and path come from
/// the document's address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodeRecord {
    pub name: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_type: Option<SectionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<AssetType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NodeRecord {
    pub fn from_node(node: &HierarchyNode) -> Self {
        Self {
            name: node.name.clone(),
            code: node.code.clone(),
            section_type: node.section_type,
            asset_type: node.asset_type,
            created_at: node.created_at,
            updated_at: node.updated_at,
        }
    }

    pub fn into_node(self, path: NodePath) -> OrgResult<HierarchyNode> {
        let (Some(id), Some(level)) = (path.id().map(str::to_string), path.level()) else {
            return Err(ValidationError::InvalidPath {
                path: path.to_string(),
                reason: "the org root is not a node".to_string(),
            }
            .into());
        };
        Ok(HierarchyNode {
            id,
            name: self.name,
            code: self.code,
            level,
            path,
            section_type: self.section_type,
            asset_type: self.asset_type,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }

    pub fn encode(&self) -> OrgResult<serde_json::Value> {
        Ok(encode_body(self)?)
    }
}

/// Decode a stored node document.
pub fn node_from_document(doc: &Document) -> OrgResult<HierarchyNode> {
    let path: NodePath = doc.path.parse().map_err(|e: ValidationError| {
        StorageError::Serialization {
            reason: e.to_string(),
        }
    })?;
    let record: NodeRecord = doc.decode()?;
    record.into_node(path)
}

/// Encode a node into its document body.
pub fn node_body(node: &HierarchyNode) -> OrgResult<serde_json::Value> {
    NodeRecord::from_node(node).encode()
}
