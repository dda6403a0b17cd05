//! OrgScope Core - Entity Types
//!
//! Data types shared by every OrgScope crate: levels, paths, hierarchy nodes,
//! planning groups, the error taxonomy and configuration. No storage access
//! happens here.

mod config;
mod enums;
mod error;
mod group;
mod identity;
mod level;
mod node;
mod path;

pub use config::{OrgScopeConfig, ScopeCommitMode};
pub use enums::EntityType;
pub use error::{
    ConfigError, ConflictError, NotFoundError, OrgError, OrgResult, StorageError, ValidationError,
};
pub use group::{GroupUpdate, NewPlanningGroup, PlanningGroup, SectionAssignment};
pub use identity::{
    new_document_id, require_text, validate_code, validate_document_id, DocumentId, Timestamp,
};
pub use level::{Level, LevelKind};
pub use node::{
    validate_node_attributes, AssetType, HierarchyNode, NewNode, NodeAction, NodeUpdate,
    SectionType,
};
pub use path::{CollectionPath, NodePath, ROOT_SEGMENT};

// =============================================================================
// PROPERTY TESTS
// =============================================================================
