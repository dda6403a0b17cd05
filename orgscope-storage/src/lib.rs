//! OrgScope Storage - Document Store Trait and Backends
//!
//! Defines the path-addressed document store the hierarchy and planning
//! crates build on, the atomic write batch, and two backends: an in-memory
//! store for tests and an LMDB store for persistence.

pub mod batch;
pub mod document;
pub mod lmdb;
pub mod memory;
pub mod sequence;
pub mod traits;

pub use batch::{CommitReceipt, Precondition, WriteBatch, WriteOp};
pub use document::{encode_body, is_direct_member, is_within, validate_path, Document};
pub use lmdb::{LmdbDocumentStore, LmdbStoreError};
pub use memory::InMemoryDocumentStore;
pub use sequence::Sequence;
pub use traits::{DocumentStore, StoreStatistics};

// ============================================================================
// PROPERTY TESTS
// ============================================================================
