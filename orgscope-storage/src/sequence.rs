//! Atomic counters for generated codes.
//!
//! A counter is a single document `{ "value": n }`. Each increment reads the
//! document and commits the next value guarded by a version precondition, so
//! two concurrent increments can never hand out the same value. A lost race
//! is retried up to the configured limit.

use crate::{DocumentStore, WriteBatch};
use orgscope_core::{ConflictError, EntityType, OrgError, OrgResult, StorageError};
use serde_json::json;
use std::sync::Arc;

/// Counter document at a fixed path.
#[derive(Clone)]
pub struct Sequence {
    store: Arc<dyn DocumentStore>,
    path: String,
    max_retries: u32,
}

impl Sequence {
    /// Counter `name` inside `collection`.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: &str,
        name: &str,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            path: format!("{}/{}", collection, name),
            max_retries: max_retries.max(1),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current value without incrementing; zero before first use.
    pub async fn current(&self) -> OrgResult<u64> {
        let doc = self.store.get(&self.path).await?;
        Ok(doc
            .and_then(|d| d.data.get("value").and_then(|v| v.as_u64()))
            .unwrap_or(0))
    }

    /// Increment and return the new value. The first value is 1.
    pub async fn next_value(&self) -> OrgResult<u64> {
        for attempt in 1..=self.max_retries {
            let current = self.store.get(&self.path).await?;

            let mut batch = WriteBatch::new();
            let next = match &current {
                Some(doc) => {
                    let value = doc
                        .data
                        .get("value")
                        .and_then(|v| v.as_u64())
                        .ok_or_else(|| StorageError::Serialization {
                            reason: format!("{}: counter value is not an integer", self.path),
                        })?;
                    batch
                        .require_version(self.path.clone(), doc.version)
                        .set(self.path.clone(), json!({ "value": value + 1 }));
                    value + 1
                }
                None => {
                    batch.create(self.path.clone(), json!({ "value": 1 }));
                    1
                }
            };

            match self.store.commit(batch).await {
                Ok(_) => return Ok(next),
                Err(OrgError::Storage(StorageError::PreconditionFailed { .. })) => {
                    tracing::debug!(path = %self.path, attempt, "counter contended, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(path = %self.path, retries = self.max_retries, "counter increment gave up");
        Err(ConflictError::ConcurrentModification {
            entity_type: EntityType::Sequence,
            id: self.path.clone(),
        }
        .into())
    }

    /// Next value formatted as `{prefix}-{value}` zero-padded to `width`.
    pub async fn next_code(&self, prefix: &str, width: usize) -> OrgResult<String> {
        let value = self.next_value().await?;
        Ok(format!("{}-{:0width$}", prefix, value, width = width))
    }
}
