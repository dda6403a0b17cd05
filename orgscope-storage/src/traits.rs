//! Async document store trait.
//!
//! The store is addressed by slash-separated paths. Documents live at
//! `collection/id`; a collection is any path with an odd number of
//! segments. The only atomicity boundary is a single [`WriteBatch`].

use crate::{CommitReceipt, Document, WriteBatch};
use async_trait::async_trait;
use orgscope_core::OrgResult;

/// Async document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document.
    async fn get(&self, path: &str) -> OrgResult<Option<Document>>;

    /// Direct members of a collection, in path order.
    async fn list(&self, collection: &str) -> OrgResult<Vec<Document>>;

    /// Apply a batch atomically: every precondition holds and every
    /// operation applies, or nothing changes.
    async fn commit(&self, batch: WriteBatch) -> OrgResult<CommitReceipt>;

    /// Check store connectivity.
    async fn health_check(&self) -> OrgResult<bool>;

    /// Get store statistics.
    async fn statistics(&self) -> OrgResult<StoreStatistics>;

    /// Largest batch `commit` accepts, in write operations.
    fn max_batch_operations(&self) -> usize;
}

/// Store statistics for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    pub document_count: u64,
    pub commits: u64,
    pub rejected_commits: u64,
    pub total_size_bytes: Option<u64>,
}
