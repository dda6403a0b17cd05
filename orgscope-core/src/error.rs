//! Error types for OrgScope operations

use crate::EntityType;
use thiserror::Error;

/// Lookup of a path or id that does not exist.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{entity_type} not found: {id}")]
pub struct NotFoundError {
    pub entity_type: EntityType,
    pub id: String,
}

impl NotFoundError {
    pub fn new(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self {
            entity_type,
            id: id.into(),
        }
    }
}

/// Validation errors. Raised before any write is attempted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Level {level} is outside the supported range 1..=7")]
    LevelOutOfRange { level: u8 },

    #[error("Level mismatch: expected {expected}, got {got}")]
    LevelMismatch { expected: u8, got: u8 },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Attribute {attribute} is not allowed on level {level} nodes")]
    AttributeNotAllowed { attribute: String, level: u8 },
}

/// Conflicts with state held by other writers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConflictError {
    #[error("Planning group code '{code}' is already used by group {existing_id}")]
    DuplicateCode { code: String, existing_id: String },

    #[error("Code '{code}' is already used by a sibling under {parent}")]
    DuplicateSiblingCode { code: String, parent: String },

    #[error("Sections no longer available: {section_ids:?}")]
    SectionUnavailable { section_ids: Vec<String> },

    #[error("{entity_type} {id} was modified concurrently")]
    ConcurrentModification { entity_type: EntityType, id: String },
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Precondition failed on {path}: {reason}")]
    PreconditionFailed { path: String, reason: String },

    #[error("Batch of {operations} operations exceeds the limit of {limit}")]
    BatchTooLarge { operations: usize, limit: usize },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Storage backend failure: {reason}")]
    Backend { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all OrgScope errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrgError {
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl OrgError {
    /// Message rendered by the presentation boundary.
    pub fn user_message(&self) -> String {
        match self {
            OrgError::NotFound(e) => format!("This {} no longer exists.", e.entity_type.label()),
            OrgError::Validation(e) => e.to_string(),
            OrgError::Conflict(ConflictError::SectionUnavailable { .. }) => {
                "This section is no longer available. Refresh the list and try again.".to_string()
            }
            OrgError::Conflict(ConflictError::ConcurrentModification { entity_type, .. }) => format!(
                "This {} was changed by someone else. Refresh and try again.",
                entity_type.label()
            ),
            OrgError::Conflict(e) => e.to_string(),
            OrgError::Storage(_) => {
                "The change could not be stored. Nothing was deleted or modified.".to_string()
            }
            OrgError::Config(e) => e.to_string(),
        }
    }

    /// Whether retrying after a refresh can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrgError::Conflict(ConflictError::SectionUnavailable { .. })
                | OrgError::Conflict(ConflictError::ConcurrentModification { .. })
                | OrgError::Storage(StorageError::PreconditionFailed { .. })
        )
    }
}

/// Result type alias for OrgScope operations.
pub type OrgResult<T> = Result<T, OrgError>;

// =============================================================================
// TESTS
// =============================================================================
