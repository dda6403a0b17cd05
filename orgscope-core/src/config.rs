//! Configuration types

use crate::{ConfigError, OrgError, OrgResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the scope engine persists a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ScopeCommitMode {
    /// Re-read every group at commit and guard the write with version
    /// preconditions. Concurrent commits surface as a conflict.
    #[default]
    Checked,
    /// Write the draft as-is. Two editors that both passed their local
    /// availability check can end up claiming the same section.
    Unchecked,
}

impl fmt::Display for ScopeCommitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeCommitMode::Checked => f.write_str("checked"),
            ScopeCommitMode::Unchecked => f.write_str("unchecked"),
        }
    }
}

impl FromStr for ScopeCommitMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checked" => Ok(ScopeCommitMode::Checked),
            "unchecked" => Ok(ScopeCommitMode::Unchecked),
            other => Err(ConfigError::InvalidValue {
                field: "scope_commit_mode".to_string(),
                value: other.to_string(),
                reason: "expected 'checked' or 'unchecked'".to_string(),
            }),
        }
    }
}

/// Runtime configuration shared by the repositories and engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OrgScopeConfig {
    /// Module whose planning groups this instance manages
    pub planning_module: String,
    /// Upper bound on operations in one write batch
    pub max_batch_operations: usize,
    /// Reject a node whose code is already used by a sibling
    pub strict_sibling_codes: bool,
    pub scope_commit_mode: ScopeCommitMode,
    /// Strip deleted sections from planning groups inside the delete batch
    pub cleanup_group_references_on_delete: bool,
    /// Buffer size of the broadcast audit channel
    pub audit_channel_capacity: usize,
    /// Attempts before a counter increment gives up under contention
    pub sequence_max_retries: u32,
}

impl Default for OrgScopeConfig {
    fn default() -> Self {
        Self {
            planning_module: "AM".to_string(),
            max_batch_operations: 500,
            strict_sibling_codes: false,
            scope_commit_mode: ScopeCommitMode::Checked,
            cleanup_group_references_on_delete: true,
            audit_channel_capacity: 256,
            sequence_max_retries: 5,
        }
    }
}

impl OrgScopeConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `ORGSCOPE_PLANNING_MODULE` (default: AM)
    /// - `ORGSCOPE_MAX_BATCH_OPERATIONS` (default: 500)
    /// - `ORGSCOPE_STRICT_SIBLING_CODES` (default: false)
    /// - `ORGSCOPE_SCOPE_COMMIT_MODE`: `checked` or `unchecked` (default: checked)
    /// - `ORGSCOPE_CLEANUP_GROUP_REFERENCES` (default: true)
    /// - `ORGSCOPE_AUDIT_CHANNEL_CAPACITY` (default: 256)
    /// - `ORGSCOPE_SEQUENCE_MAX_RETRIES` (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            planning_module: std::env::var("ORGSCOPE_PLANNING_MODULE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.planning_module),
            max_batch_operations: std::env::var("ORGSCOPE_MAX_BATCH_OPERATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_batch_operations),
            strict_sibling_codes: std::env::var("ORGSCOPE_STRICT_SIBLING_CODES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.strict_sibling_codes),
            scope_commit_mode: std::env::var("ORGSCOPE_SCOPE_COMMIT_MODE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.scope_commit_mode),
            cleanup_group_references_on_delete: std::env::var("ORGSCOPE_CLEANUP_GROUP_REFERENCES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cleanup_group_references_on_delete),
            audit_channel_capacity: std::env::var("ORGSCOPE_AUDIT_CHANNEL_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.audit_channel_capacity),
            sequence_max_retries: std::env::var("ORGSCOPE_SEQUENCE_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sequence_max_retries),
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> OrgResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> OrgResult<()> {
        let module = self.planning_module.trim();
        if module.is_empty() || module.contains('/') {
            return Err(OrgError::Config(ConfigError::InvalidValue {
                field: "planning_module".to_string(),
                value: self.planning_module.clone(),
                reason: "planning_module must be a non-empty path segment".to_string(),
            }));
        }

        if self.max_batch_operations == 0 {
            return Err(OrgError::Config(ConfigError::InvalidValue {
                field: "max_batch_operations".to_string(),
                value: self.max_batch_operations.to_string(),
                reason: "max_batch_operations must be greater than 0".to_string(),
            }));
        }

        if self.audit_channel_capacity == 0 {
            return Err(OrgError::Config(ConfigError::InvalidValue {
                field: "audit_channel_capacity".to_string(),
                value: self.audit_channel_capacity.to_string(),
                reason: "audit_channel_capacity must be greater than 0".to_string(),
            }));
        }

        if self.sequence_max_retries == 0 {
            return Err(OrgError::Config(ConfigError::InvalidValue {
                field: "sequence_max_retries".to_string(),
                value: self.sequence_max_retries.to_string(),
                reason: "sequence_max_retries must be at least 1".to_string(),
            }));
        }

        Ok(())
    }

    /// Collection holding this module's planning groups.
    pub fn planning_groups_collection(&self) -> String {
        format!("org/modules/{}/planningGroups", self.planning_module.trim())
    }

    /// Collection holding counter documents.
    pub fn counters_collection(&self) -> String {
        "org/counters".to_string()
    }

    /// Document bumped by every checked scope commit in this module.
    pub fn scope_ledger_path(&self) -> String {
        format!("org/modules/{}/scope/ledger", self.planning_module.trim())
    }
}

// =============================================================================
// TESTS
// =============================================================================
