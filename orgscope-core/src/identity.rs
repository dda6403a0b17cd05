//! Identity types and field validation helpers.

use crate::ValidationError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

/// Opaque document identifier. Unique within its parent collection.
pub type DocumentId = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

static CODE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,31}$").expect("code pattern is a valid regex")
});

/// Generate a new document id (UUIDv7, timestamp-sortable).
pub fn new_document_id() -> DocumentId {
    Uuid::now_v7().to_string()
}

/// Check that an id can be used as a single path segment.
pub fn validate_document_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "id".to_string(),
        });
    }
    if id.contains('/') || id.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidValue {
            field: "id".to_string(),
            reason: format!("'{}' must not contain '/' or whitespace", id),
        });
    }
    Ok(())
}

/// Require a non-blank text field and return it trimmed.
pub fn require_text(field: &str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Validate a short structured code (node or planning group).
pub fn validate_code(field: &str, value: &str) -> Result<String, ValidationError> {
    let code = require_text(field, value)?;
    if !CODE_PATTERN.is_match(&code) {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!(
                "'{}' must be 1-32 letters, digits, '.', '_' or '-' and start with a letter or digit",
                code
            ),
        });
    }
    Ok(code)
}
