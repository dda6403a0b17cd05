//! Hierarchy node types.

use crate::{
    require_text, validate_code, CollectionPath, DocumentId, Level, LevelKind, NodePath,
    Timestamp, ValidationError,
};
use serde::{Deserialize, Serialize};

/// Classification of a section (level 5) node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum SectionType {
    Production,
    Utility,
    Maintenance,
    Office,
    /// Exposes the inventory configuration action.
    InventoryWarehouse,
}

/// Classification of an asset (level 6) node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum AssetType {
    Machine,
    Instrument,
    Vehicle,
    Facility,
    Tool,
}

/// Operations the tree offers on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum NodeAction {
    AddChild,
    Edit,
    Delete,
    Configure,
}

/// One entry in the organizational tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HierarchyNode {
    pub id: DocumentId,
    pub name: String,
    pub code: String,
    #[cfg_attr(feature = "openapi", schema(value_type = u8, minimum = 1, maximum = 7))]
    pub level: Level,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub path: NodePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_type: Option<SectionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<AssetType>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl HierarchyNode {
    pub fn kind(&self) -> LevelKind {
        self.level.kind()
    }

    /// Children collection; `None` for assemblies.
    pub fn child_collection(&self) -> Option<CollectionPath> {
        self.path.child_collection()
    }

    pub fn can_have_children(&self) -> bool {
        !self.level.is_deepest()
    }

    pub fn is_inventory_warehouse(&self) -> bool {
        self.section_type == Some(SectionType::InventoryWarehouse)
    }

    /// Actions legal on this node given its level and flags.
    pub fn actions(&self) -> Vec<NodeAction> {
        let mut actions = Vec::with_capacity(4);
        if self.can_have_children() {
            actions.push(NodeAction::AddChild);
        }
        actions.push(NodeAction::Edit);
        actions.push(NodeAction::Delete);
        if self.is_inventory_warehouse() {
            actions.push(NodeAction::Configure);
        }
        actions
    }
}

/// Check that level-dependent attributes are only set where they apply.
pub fn validate_node_attributes(
    level: Level,
    section_type: Option<SectionType>,
    asset_type: Option<AssetType>,
) -> Result<(), ValidationError> {
    if section_type.is_some() && level != Level::SECTION {
        return Err(ValidationError::AttributeNotAllowed {
            attribute: "sectionType".to_string(),
            level: level.get(),
        });
    }
    if asset_type.is_some() && level != Level::ASSET {
        return Err(ValidationError::AttributeNotAllowed {
            attribute: "assetType".to_string(),
            level: level.get(),
        });
    }
    Ok(())
}

/// Input for creating a node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewNode {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub section_type: Option<SectionType>,
    #[serde(default)]
    pub asset_type: Option<AssetType>,
}

impl NewNode {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            section_type: None,
            asset_type: None,
        }
    }

    pub fn with_section_type(mut self, section_type: SectionType) -> Self {
        self.section_type = Some(section_type);
        self
    }

    pub fn with_asset_type(mut self, asset_type: AssetType) -> Self {
        self.asset_type = Some(asset_type);
        self
    }

    /// Validate for creation at `level`; returns the normalized input.
    pub fn validate(&self, level: Level) -> Result<NewNode, ValidationError> {
        let name = require_text("name", &self.name)?;
        let code = validate_code("code", &self.code)?;
        validate_node_attributes(level, self.section_type, self.asset_type)?;
        Ok(NewNode {
            name,
            code,
            section_type: self.section_type,
            asset_type: self.asset_type,
        })
    }
}

/// Partial update of a node's mutable fields.
///
/// The outer `Option` on the flags means "leave unchanged"; `Some(None)`
/// clears the flag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeUpdate {
    pub name: Option<String>,
    pub code: Option<String>,
    pub section_type: Option<Option<SectionType>>,
    pub asset_type: Option<Option<AssetType>>,
}

impl NodeUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.code.is_none()
            && self.section_type.is_none()
            && self.asset_type.is_none()
    }

    /// Apply to a node in place, validating every touched field.
    pub fn apply_to(&self, node: &mut HierarchyNode) -> Result<(), ValidationError> {
        let name = self
            .name
            .as_deref()
            .map(|n| require_text("name", n))
            .transpose()?;
        let code = self
            .code
            .as_deref()
            .map(|c| validate_code("code", c))
            .transpose()?;
        let section_type = self.section_type.unwrap_or(node.section_type);
        let asset_type = self.asset_type.unwrap_or(node.asset_type);
        validate_node_attributes(node.level, section_type, asset_type)?;

        if let Some(name) = name {
            node.name = name;
        }
        if let Some(code) = code {
            node.code = code;
        }
        node.section_type = section_type;
        node.asset_type = asset_type;
        Ok(())
    }
}
