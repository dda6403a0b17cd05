//! Stored documents and path helpers.

use orgscope_core::{StorageError, Timestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A versioned JSON document at a slash-separated path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: String,
    pub data: serde_json::Value,
    /// Starts at 1 and increases by one on every write.
    pub version: u64,
    pub updated_at: Timestamp,
}

impl Document {
    /// Last path segment.
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Deserialize the body into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        serde_json::from_value(self.data.clone()).map_err(|e| StorageError::Serialization {
            reason: format!("{}: {}", self.path, e),
        })
    }
}

/// Serialize a value into a document body. The result must be a JSON object.
pub fn encode_body<T: Serialize>(value: &T) -> Result<serde_json::Value, StorageError> {
    let body = serde_json::to_value(value).map_err(|e| StorageError::Serialization {
        reason: e.to_string(),
    })?;
    if !body.is_object() {
        return Err(StorageError::Serialization {
            reason: "document body must be a JSON object".to_string(),
        });
    }
    Ok(body)
}

/// Reject empty paths, empty segments and leading or trailing slashes.
pub fn validate_path(path: &str) -> Result<(), StorageError> {
    if path.is_empty() || path.split('/').any(str::is_empty) {
        return Err(StorageError::PreconditionFailed {
            path: path.to_string(),
            reason: "malformed document path".to_string(),
        });
    }
    Ok(())
}

/// Whether `path` is a direct member of `collection`.
pub fn is_direct_member(collection: &str, path: &str) -> bool {
    path.strip_prefix(collection)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(|id| !id.is_empty() && !id.contains('/'))
        .unwrap_or(false)
}

/// Whether `path` equals `root` or lies anywhere beneath it.
pub fn is_within(root: &str, path: &str) -> bool {
    path == root
        || path
            .strip_prefix(root)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
}
