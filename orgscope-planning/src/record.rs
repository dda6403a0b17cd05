//! Persisted planning group body.

use chrono::{DateTime, Utc};
use orgscope_core::{OrgResult, PlanningGroup, SectionAssignment};
use orgscope_storage::{encode_body, Document};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupRecord {
    code: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    assigned_sections: Vec<SectionAssignment>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// A group together with the store version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedGroup {
    pub group: PlanningGroup,
    pub version: u64,
}

/// Decode a stored group document.
pub fn group_from_document(doc: &Document) -> OrgResult<VersionedGroup> {
    let record: GroupRecord = doc.decode()?;
    Ok(VersionedGroup {
        group: PlanningGroup {
            id: doc.id().to_string(),
            code: record.code,
            name: record.name,
            description: record.description,
            assigned_sections: record.assigned_sections,
            created_at: record.created_at,
            updated_at: record.updated_at,
        },
        version: doc.version,
    })
}

/// Encode a group into its document body.
pub fn group_body(group: &PlanningGroup) -> OrgResult<serde_json::Value> {
    let record = GroupRecord {
        code: group.code.clone(),
        name: group.name.clone(),
        description: group.description.clone(),
        assigned_sections: group.assigned_sections.clone(),
        created_at: group.created_at,
        updated_at: group.updated_at,
    };
    Ok(encode_body(&record)?)
}

/// Fields written when only the scope of a group changes.
pub fn scope_fields(
    sections: &[SectionAssignment],
    updated_at: DateTime<Utc>,
) -> OrgResult<serde_json::Value> {
    Ok(serde_json::json!({
        "assignedSections": serde_json::to_value(sections)
            .map_err(|e| orgscope_core::StorageError::Serialization { reason: e.to_string() })?,
        "updatedAt": updated_at,
    }))
}
