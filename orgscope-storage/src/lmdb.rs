//! LMDB-backed document store.
//!
//! Uses the heed crate (Rust bindings for LMDB). Keys are document paths,
//! values are the JSON-encoded [`Document`]. Every batch runs inside one
//! write transaction: preconditions and staging read through that
//! transaction, so LMDB's single-writer lock makes each commit atomic and
//! serialized with respect to other commits.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn};
use orgscope_core::{OrgResult, StorageError};

use crate::batch::{receipt_for, stage, StagedWrite};
use crate::document::is_direct_member;
use crate::{CommitReceipt, Document, DocumentStore, StoreStatistics, WriteBatch};

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored bytes could not be decoded.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Document could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for StorageError {
    fn from(e: LmdbStoreError) -> Self {
        match e {
            LmdbStoreError::Serialization(reason) | LmdbStoreError::Deserialization(reason) => {
                StorageError::Serialization { reason }
            }
            other => StorageError::Backend {
                reason: other.to_string(),
            },
        }
    }
}

impl From<LmdbStoreError> for orgscope_core::OrgError {
    fn from(e: LmdbStoreError) -> Self {
        orgscope_core::OrgError::Storage(e.into())
    }
}

/// LMDB-backed document store.
pub struct LmdbDocumentStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    commits: AtomicU64,
    rejected_commits: AtomicU64,
    max_batch_operations: usize,
}

impl LmdbDocumentStore {
    /// Open (or create) a store in `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        tracing::info!(path = %path.as_ref().display(), max_size_mb, "opened LMDB document store");

        Ok(Self {
            env,
            db,
            commits: AtomicU64::new(0),
            rejected_commits: AtomicU64::new(0),
            max_batch_operations: 500,
        })
    }

    /// Cap the number of operations a single batch may carry.
    pub fn with_max_batch_operations(mut self, limit: usize) -> Self {
        self.max_batch_operations = limit;
        self
    }

    fn read_in(&self, txn: &RoTxn, path: &str) -> Result<Option<Document>, LmdbStoreError> {
        match self.db.get(txn, path.as_bytes()) {
            Ok(Some(bytes)) => serde_json::from_slice(bytes)
                .map(Some)
                .map_err(|e| LmdbStoreError::Deserialization(e.to_string())),
            Ok(None) => Ok(None),
            Err(e) => Err(LmdbStoreError::Transaction(e.to_string())),
        }
    }

    fn commit_inner(&self, batch: &WriteBatch) -> Result<CommitReceipt, StorageError> {
        batch.ensure_within(self.max_batch_operations)?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let now = Utc::now();
        let staged = stage(batch, now, |path| {
            self.read_in(&wtxn, path).map_err(StorageError::from)
        })?;

        for write in &staged {
            match write {
                StagedWrite::Put(doc) => {
                    let bytes = serde_json::to_vec(doc)
                        .map_err(|e| LmdbStoreError::Serialization(e.to_string()))?;
                    self.db
                        .put(&mut wtxn, doc.path.as_bytes(), &bytes)
                        .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
                }
                StagedWrite::Remove(path) => {
                    self.db
                        .delete(&mut wtxn, path.as_bytes())
                        .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
                }
            }
        }

        wtxn.commit()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        Ok(receipt_for(&staged, now))
    }
}

#[async_trait]
impl DocumentStore for LmdbDocumentStore {
    async fn get(&self, path: &str) -> OrgResult<Option<Document>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(self.read_in(&rtxn, path)?)
    }

    async fn list(&self, collection: &str) -> OrgResult<Vec<Document>> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        // Seeks to the collection's key range; descendants deeper than
        // direct members still share the prefix and are skipped below.
        let prefix = format!("{}/", collection);
        let iter = self
            .db
            .prefix_iter(&rtxn, prefix.as_bytes())
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;

        let mut docs = Vec::new();
        for result in iter {
            let (key, value) = result.map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
            let Ok(path) = std::str::from_utf8(key) else {
                continue;
            };
            if is_direct_member(collection, path) {
                let doc: Document = serde_json::from_slice(value)
                    .map_err(|e| LmdbStoreError::Deserialization(e.to_string()))?;
                docs.push(doc);
            }
        }
        Ok(docs)
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
        Ok(self.env.read_txn().is_ok())
    }

    async fn statistics(&self) -> OrgResult<StoreStatistics> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        let count = self
            .db
            .len(&rtxn)
            .map_err(|e| LmdbStoreError::Transaction(e.to_string()))?;
        Ok(StoreStatistics {
            document_count: count,
            commits: self.commits.load(Ordering::SeqCst),
            rejected_commits: self.rejected_commits.load(Ordering::SeqCst),
            total_size_bytes: None,
        })
    }

    fn max_batch_operations(&self) -> usize {
        self.max_batch_operations
    }
}
