//! Enum types shared across OrgScope crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity type discriminator used in errors and audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EntityType {
    HierarchyNode,
    PlanningGroup,
    Sequence,
    Document,
}

impl EntityType {
    /// Lower-case label for user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::HierarchyNode => "node",
            EntityType::PlanningGroup => "planning group",
            EntityType::Sequence => "sequence",
            EntityType::Document => "document",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            EntityType::HierarchyNode => "HierarchyNode",
            EntityType::PlanningGroup => "PlanningGroup",
            EntityType::Sequence => "Sequence",
            EntityType::Document => "Document",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "hierarchynode" | "node" => Ok(EntityType::HierarchyNode),
            "planninggroup" | "group" => Ok(EntityType::PlanningGroup),
            "sequence" | "counter" => Ok(EntityType::Sequence),
            "document" => Ok(EntityType::Document),
            _ => Err(format!("Invalid EntityType: {}", s)),
        }
    }
}
