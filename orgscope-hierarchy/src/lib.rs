//! OrgScope Hierarchy - Organizational Tree
//!
//! Seven-level tree of company, division, site, department, section, asset
//! and assembly nodes, addressed by ancestry path:
//!
//! ```text
//! org/level_1/{id}
//! org/level_1/{id}/level_2/{id}
//! ...
//! org/level_1/.../level_7/{id}
//! ```
//!
//! - [`NodeRepository`]: list, create, update and read nodes
//! - [`CascadeDeleter`]: remove a node and its subtree in one batch
//! - [`TreeState`]: caller-owned lazy expansion model

mod cascade;
mod record;
mod repository;
mod tree;

pub use cascade::{CascadeDeleter, DeleteReport, ReferenceCleaner, RemovedSubtree};
pub use record::{node_body, node_from_document};
pub use repository::NodeRepository;
pub use tree::{TreeRow, TreeState};

// ============================================================================
// PROPERTY TESTS
// ============================================================================
