//! Planning group types.

use crate::{
    require_text, validate_code, DocumentId, HierarchyNode, Level, NodePath, Timestamp,
    ValidationError,
};
use serde::{Deserialize, Serialize};

/// Denormalized reference to a section (level 5) node and its site and
/// department ancestors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SectionAssignment {
    pub l3_id: DocumentId,
    pub l3_name: String,
    pub l4_id: DocumentId,
    pub l4_name: String,
    pub l5_id: DocumentId,
    pub l5_name: String,
    /// Path of the section node.
    pub path: String,
}

impl SectionAssignment {
    /// Build from the site, department and section nodes.
    ///
    /// Fails unless the nodes sit at levels 3, 4 and 5 and form one
    /// ancestry chain.
    pub fn from_nodes(
        site: &HierarchyNode,
        department: &HierarchyNode,
        section: &HierarchyNode,
    ) -> Result<Self, ValidationError> {
        for (node, expected) in [
            (site, Level::SITE),
            (department, Level::DEPARTMENT),
            (section, Level::SECTION),
        ] {
            if node.level != expected {
                return Err(ValidationError::LevelMismatch {
                    expected: expected.get(),
                    got: node.level.get(),
                });
            }
        }
        if section.path.parent().as_ref() != Some(&department.path)
            || department.path.parent().as_ref() != Some(&site.path)
        {
            return Err(ValidationError::InvalidPath {
                path: section.path.to_string(),
                reason: format!(
                    "section is not under department {} of site {}",
                    department.path, site.path
                ),
            });
        }

        Ok(Self {
            l3_id: site.id.clone(),
            l3_name: site.name.clone(),
            l4_id: department.id.clone(),
            l4_name: department.name.clone(),
            l5_id: section.id.clone(),
            l5_name: section.name.clone(),
            path: section.path.to_string(),
        })
    }

    /// Parsed section path.
    pub fn section_path(&self) -> Result<NodePath, ValidationError> {
        self.path.parse()
    }
}

/// A named set of sections grouped for maintenance planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PlanningGroup {
    pub id: DocumentId,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assigned_sections: Vec<SectionAssignment>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl PlanningGroup {
    /// Ids of the claimed sections, in assignment order.
    pub fn section_ids(&self) -> impl Iterator<Item = &str> {
        self.assigned_sections.iter().map(|s| s.l5_id.as_str())
    }

    pub fn claims(&self, section_id: &str) -> bool {
        self.section_ids().any(|id| id == section_id)
    }
}

/// Input for creating a planning group.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewPlanningGroup {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl NewPlanningGroup {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Validate and normalize.
    pub fn validate(&self) -> Result<NewPlanningGroup, ValidationError> {
        Ok(NewPlanningGroup {
            code: validate_code("code", &self.code)?,
            name: require_text("name", &self.name)?,
            description: self.description.trim().to_string(),
        })
    }
}

/// Partial update of a planning group's descriptive fields.
///
/// Scope changes go through the scope engine, not this type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

impl GroupUpdate {
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.name.is_none() && self.description.is_none()
    }

    /// Apply to a group in place, validating every touched field.
    pub fn apply_to(&self, group: &mut PlanningGroup) -> Result<(), ValidationError> {
        let code = self
            .code
            .as_deref()
            .map(|c| validate_code("code", c))
            .transpose()?;
        let name = self
            .name
            .as_deref()
            .map(|n| require_text("name", n))
            .transpose()?;

        if let Some(code) = code {
            group.code = code;
        }
        if let Some(name) = name {
            group.name = name;
        }
        if let Some(description) = &self.description {
            group.description = description.trim().to_string();
        }
        Ok(())
    }
}
