//! Atomic write batches.
//!
//! A batch is a list of preconditions plus a list of write operations.
//! Backends evaluate every precondition against the state before the batch,
//! stage every operation, and only then apply the staged writes in one
//! transaction. A failure anywhere leaves the store untouched.

use crate::document::{validate_path, Document};
use orgscope_core::{StorageError, Timestamp};
use std::collections::BTreeMap;

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Write a new document; fails if the path is taken.
    Create {
        path: String,
        data: serde_json::Value,
    },
    /// Write a document, replacing any previous body.
    Set {
        path: String,
        data: serde_json::Value,
    },
    /// Merge top-level fields into an existing document; fails if absent.
    Update {
        path: String,
        fields: serde_json::Value,
    },
    /// Remove a document. Removing an absent document is a no-op.
    Delete { path: String },
}

impl WriteOp {
    pub fn path(&self) -> &str {
        match self {
            WriteOp::Create { path, .. }
            | WriteOp::Set { path, .. }
            | WriteOp::Update { path, .. }
            | WriteOp::Delete { path } => path,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, WriteOp::Delete { .. })
    }
}

/// Condition on the pre-batch state that must hold for the batch to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    Exists { path: String },
    Missing { path: String },
    /// The document exists at exactly this version.
    Version { path: String, version: u64 },
}

impl Precondition {
    pub fn path(&self) -> &str {
        match self {
            Precondition::Exists { path }
            | Precondition::Missing { path }
            | Precondition::Version { path, .. } => path,
        }
    }

    fn check(&self, current: Option<&Document>) -> Result<(), StorageError> {
        let failed = |reason: String| StorageError::PreconditionFailed {
            path: self.path().to_string(),
            reason,
        };
        match (self, current) {
            (Precondition::Exists { .. }, None) => Err(failed("document does not exist".into())),
            (Precondition::Missing { .. }, Some(doc)) => Err(failed(format!(
                "document already exists at version {}",
                doc.version
            ))),
            (Precondition::Version { .. }, None) => Err(failed("document does not exist".into())),
            (Precondition::Version { version, .. }, Some(doc)) if doc.version != *version => {
                Err(failed(format!(
                    "expected version {}, found {}",
                    version, doc.version
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Ordered set of writes and preconditions committed all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    preconditions: Vec<Precondition>,
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn require(&mut self, precondition: Precondition) -> &mut Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn create(&mut self, path: impl Into<String>, data: serde_json::Value) -> &mut Self {
        self.push(WriteOp::Create {
            path: path.into(),
            data,
        })
    }

    pub fn set(&mut self, path: impl Into<String>, data: serde_json::Value) -> &mut Self {
        self.push(WriteOp::Set {
            path: path.into(),
            data,
        })
    }

    pub fn update(&mut self, path: impl Into<String>, fields: serde_json::Value) -> &mut Self {
        self.push(WriteOp::Update {
            path: path.into(),
            fields,
        })
    }

    pub fn delete(&mut self, path: impl Into<String>) -> &mut Self {
        self.push(WriteOp::Delete { path: path.into() })
    }

    pub fn require_version(&mut self, path: impl Into<String>, version: u64) -> &mut Self {
        self.require(Precondition::Version {
            path: path.into(),
            version,
        })
    }

    pub fn require_exists(&mut self, path: impl Into<String>) -> &mut Self {
        self.require(Precondition::Exists { path: path.into() })
    }

    pub fn require_missing(&mut self, path: impl Into<String>) -> &mut Self {
        self.require(Precondition::Missing { path: path.into() })
    }

    /// Append another batch's preconditions and operations.
    pub fn extend(&mut self, other: WriteBatch) -> &mut Self {
        self.preconditions.extend(other.preconditions);
        self.ops.extend(other.ops);
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    /// Number of write operations. Preconditions do not count.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Fail with `BatchTooLarge` when the batch exceeds `limit` operations.
    pub fn ensure_within(&self, limit: usize) -> Result<(), StorageError> {
        if self.ops.len() > limit {
            return Err(StorageError::BatchTooLarge {
                operations: self.ops.len(),
                limit,
            });
        }
        Ok(())
    }
}

/// Outcome of a committed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    pub committed_at: Timestamp,
    /// New version of every written document.
    pub versions: BTreeMap<String, u64>,
    /// Paths removed by the batch.
    pub deleted: Vec<String>,
}

impl CommitReceipt {
    pub fn version_of(&self, path: &str) -> Option<u64> {
        self.versions.get(path).copied()
    }

    pub fn operations(&self) -> usize {
        self.versions.len() + self.deleted.len()
    }
}

/// Final state of one path after staging.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StagedWrite {
    Put(Document),
    Remove(String),
}

/// Check preconditions and stage every operation against `load`.
///
/// `load` must read the pre-batch state. Nothing is written here.
pub(crate) fn stage<F>(
    batch: &WriteBatch,
    now: Timestamp,
    mut load: F,
) -> Result<Vec<StagedWrite>, StorageError>
where
    F: FnMut(&str) -> Result<Option<Document>, StorageError>,
{
    for precondition in &batch.preconditions {
        validate_path(precondition.path())?;
        let current = load(precondition.path())?;
        precondition.check(current.as_ref())?;
    }

    let mut overlay: BTreeMap<String, Option<Document>> = BTreeMap::new();
    for op in &batch.ops {
        let path = op.path();
        validate_path(path)?;
        let current = match overlay.get(path) {
            Some(staged) => staged.clone(),
            None => load(path)?,
        };

        let next = match op {
            WriteOp::Create { data, .. } => {
                if let Some(existing) = current {
                    return Err(StorageError::PreconditionFailed {
                        path: path.to_string(),
                        reason: format!(
                            "document already exists at version {}",
                            existing.version
                        ),
                    });
                }
                Some(new_document(path, data.clone(), 1, now)?)
            }
            WriteOp::Set { data, .. } => {
                let version = current.map_or(1, |doc| doc.version + 1);
                Some(new_document(path, data.clone(), version, now)?)
            }
            WriteOp::Update { fields, .. } => {
                let existing = current.ok_or_else(|| StorageError::PreconditionFailed {
                    path: path.to_string(),
                    reason: "cannot update a document that does not exist".to_string(),
                })?;
                let data = merge_fields(existing.data, fields)?;
                Some(new_document(path, data, existing.version + 1, now)?)
            }
            WriteOp::Delete { .. } => None,
        };
        overlay.insert(path.to_string(), next);
    }

    Ok(overlay
        .into_iter()
        .map(|(path, doc)| match doc {
            Some(doc) => StagedWrite::Put(doc),
            None => StagedWrite::Remove(path),
        })
        .collect())
}

/// Build the receipt for a set of applied writes.
pub(crate) fn receipt_for(staged: &[StagedWrite], committed_at: Timestamp) -> CommitReceipt {
    let mut receipt = CommitReceipt {
        committed_at,
        versions: BTreeMap::new(),
        deleted: Vec::new(),
    };
    for write in staged {
        match write {
            StagedWrite::Put(doc) => {
                receipt.versions.insert(doc.path.clone(), doc.version);
            }
            StagedWrite::Remove(path) => receipt.deleted.push(path.clone()),
        }
    }
    receipt
}

fn new_document(
    path: &str,
    data: serde_json::Value,
    version: u64,
    now: Timestamp,
) -> Result<Document, StorageError> {
    if !data.is_object() {
        return Err(StorageError::Serialization {
            reason: format!("{}: document body must be a JSON object", path),
        });
    }
    Ok(Document {
        path: path.to_string(),
        data,
        version,
        updated_at: now,
    })
}

fn merge_fields(
    mut data: serde_json::Value,
    fields: &serde_json::Value,
) -> Result<serde_json::Value, StorageError> {
    let (Some(target), Some(source)) = (data.as_object_mut(), fields.as_object()) else {
        return Err(StorageError::Serialization {
            reason: "update fields must be a JSON object".to_string(),
        });
    };
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
    Ok(data)
}
