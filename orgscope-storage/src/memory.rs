//! In-memory document store.
//!
//! Backed by a `BTreeMap` behind an `RwLock`, so collection listings come out
//! in path order. Carries fault injection hooks so callers can exercise
//! read and commit failures.

use crate::batch::{receipt_for, stage, StagedWrite};
use crate::document::{is_direct_member, is_within};
use crate::{CommitReceipt, Document, DocumentStore, StoreStatistics, WriteBatch};
use async_trait::async_trait;
use chrono::Utc;
use orgscope_core::{OrgResult, StorageError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

#[derive(Debug, Default)]
struct FaultPlan {
    failing_read_roots: Vec<String>,
    failing_commits: u32,
}

/// In-memory store for tests and single-process use.
#[derive(Debug, Clone)]
pub struct InMemoryDocumentStore {
    docs: Arc<RwLock<BTreeMap<String, Document>>>,
    faults: Arc<Mutex<FaultPlan>>,
    commits: Arc<AtomicU64>,
    rejected_commits: Arc<AtomicU64>,
    max_batch_operations: usize,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self {
            docs: Arc::new(RwLock::new(BTreeMap::new())),
            faults: Arc::new(Mutex::new(FaultPlan::default())),
            commits: Arc::new(AtomicU64::new(0)),
            rejected_commits: Arc::new(AtomicU64::new(0)),
            max_batch_operations: 500,
        }
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of operations a single batch may carry.
    pub fn with_max_batch_operations(mut self, limit: usize) -> Self {
        self.max_batch_operations = limit;
        self
    }

    /// Make every read at or beneath `root` fail with a backend error.
    pub fn fail_reads_within(&self, root: impl Into<String>) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing_read_roots.push(root.into());
        }
    }

    /// Make the next `count` commits fail with a backend error.
    pub fn fail_next_commits(&self, count: u32) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing_commits = count;
        }
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            *faults = FaultPlan::default();
        }
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Every stored path at or beneath `root`.
    pub fn paths_within(&self, root: &str) -> OrgResult<Vec<String>> {
        let docs = self.docs.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(docs
            .keys()
            .filter(|path| is_within(root, path))
            .cloned()
            .collect())
    }

    pub fn len(&self) -> OrgResult<usize> {
        let docs = self.docs.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(docs.len())
    }

    pub fn is_empty(&self) -> OrgResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Clear all stored data.
    pub fn clear(&self) -> OrgResult<()> {
        let mut docs = self.docs.write().map_err(|_| StorageError::LockPoisoned)?;
        docs.clear();
        Ok(())
    }

    fn check_read(&self, path: &str) -> Result<(), StorageError> {
        let faults = self.faults.lock().map_err(|_| StorageError::LockPoisoned)?;
        if faults
            .failing_read_roots
            .iter()
            .any(|root| is_within(root, path))
        {
            return Err(StorageError::Backend {
                reason: format!("injected read failure at {}", path),
            });
        }
        Ok(())
    }

    fn take_commit_fault(&self) -> Result<(), StorageError> {
        let mut faults = self.faults.lock().map_err(|_| StorageError::LockPoisoned)?;
        if faults.failing_commits > 0 {
            faults.failing_commits -= 1;
            return Err(StorageError::Backend {
                reason: "injected commit failure".to_string(),
            });
        }
        Ok(())
    }

    fn commit_inner(&self, batch: &WriteBatch) -> Result<CommitReceipt, StorageError> {
        batch.ensure_within(self.max_batch_operations)?;
        self.take_commit_fault()?;

        let mut docs = self.docs.write().map_err(|_| StorageError::LockPoisoned)?;
        let now = Utc::now();
        let staged = stage(batch, now, |path| Ok(docs.get(path).cloned()))?;

        for write in &staged {
            match write {
                StagedWrite::Put(doc) => {
                    docs.insert(doc.path.clone(), doc.clone());
                }
                StagedWrite::Remove(path) => {
                    docs.remove(path);
                }
            }
        }
        Ok(receipt_for(&staged, now))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &str) -> OrgResult<Option<Document>> {
        self.check_read(path)?;
        let docs = self.docs.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(docs.get(path).cloned())
    }

    async fn list(&self, collection: &str) -> OrgResult<Vec<Document>> {
        self.check_read(collection)?;
        let docs = self.docs.read().map_err(|_| StorageError::LockPoisoned)?;
        let prefix = format!("{}/", collection);
        Ok(docs
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter(|(path, _)| is_direct_member(collection, path))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> OrgResult<CommitReceipt> {
        match self.commit_inner(&batch) {
            Ok(receipt) => {
                self.commits.fetch_add(1, Ordering::SeqCst);
                Ok(receipt)
            }
            Err(e) => {
                self.rejected_commits.fetch_add(1, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }

    async fn health_check(&self) -> OrgResult<bool> {
        Ok(self.docs.read().is_ok())
    }

    async fn statistics(&self) -> OrgResult<StoreStatistics> {
        let docs = self.docs.read().map_err(|_| StorageError::LockPoisoned)?;
        let size: usize = docs
            .values()
            .map(|doc| doc.path.len() + doc.data.to_string().len())
            .sum();
        Ok(StoreStatistics {
            document_count: docs.len() as u64,
            commits: self.commits.load(Ordering::SeqCst),
            rejected_commits: self.rejected_commits.load(Ordering::SeqCst),
            total_size_bytes: Some(size as u64),
        })
    }

    fn max_batch_operations(&self) -> usize {
        self.max_batch_operations
    }
}

// ============================================================================
// TESTS
// ============================================================================
