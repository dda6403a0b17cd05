//! OrgScope Test Utilities
//!
//! Shared test infrastructure for the OrgScope workspace:
//! - Proptest generators for levels, paths and inputs
//! - Fixtures for configs, stores and nodes
//! - A recording audit sink
//! - Custom assertions on `OrgResult`
//! - One-time tracing setup for test binaries

pub use orgscope_storage::InMemoryDocumentStore;

pub use orgscope_core::{
    AssetType, ConflictError, EntityType, HierarchyNode, Level, NewNode, NewPlanningGroup,
    NodePath, OrgError, OrgResult, OrgScopeConfig, ScopeCommitMode, SectionAssignment,
    SectionType, StorageError, ValidationError,
};

use orgscope_events::{AuditEvent, AuditSink};
use std::sync::{Arc, Mutex, Once};

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a fmt subscriber for the test binary. Safe to call from every test.
///
/// Filtered by `RUST_LOG`, defaulting to `warn`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// RECORDING AUDIT SINK
// ============================================================================

/// Audit sink that keeps every event for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &AuditEvent) {
        tracing::trace!(action = %event.action, "recorded audit event");
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for OrgScope inputs.

    use super::*;
    use proptest::prelude::*;

    /// A valid single-segment document id.
    pub fn arb_document_id() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9][a-zA-Z0-9_-]{0,15}"
    }

    pub fn arb_level() -> impl Strategy<Value = Level> {
        (Level::MIN..=Level::MAX).prop_map(|n| Level::new(n).expect("in range"))
    }

    /// A node path of depth 1..=7.
    pub fn arb_node_path() -> impl Strategy<Value = NodePath> {
        prop::collection::vec(arb_document_id(), 1..=7)
            .prop_map(|ids| NodePath::from_ids(ids).expect("generated ids are valid"))
    }

    /// A valid node or group code.
    pub fn arb_code() -> impl Strategy<Value = String> {
        "[A-Z][A-Z0-9-]{0,9}"
    }

    /// A non-blank display name.
    pub fn arb_name() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{2,10}( [A-Z0-9][a-z0-9]{0,6})?"
    }

    pub fn arb_section_type() -> impl Strategy<Value = SectionType> {
        prop_oneof![
            Just(SectionType::Production),
            Just(SectionType::Utility),
            Just(SectionType::Maintenance),
            Just(SectionType::Office),
            Just(SectionType::InventoryWarehouse),
        ]
    }

    pub fn arb_asset_type() -> impl Strategy<Value = AssetType> {
        prop_oneof![
            Just(AssetType::Machine),
            Just(AssetType::Instrument),
            Just(AssetType::Vehicle),
            Just(AssetType::Facility),
            Just(AssetType::Tool),
        ]
    }

    /// Valid creation input for a node at `level`.
    pub fn arb_new_node(level: Level) -> impl Strategy<Value = NewNode> {
        (
            arb_name(),
            arb_code(),
            proptest::option::of(arb_section_type()),
            proptest::option::of(arb_asset_type()),
        )
            .prop_map(move |(name, code, section_type, asset_type)| NewNode {
                name,
                code,
                section_type: section_type.filter(|_| level == Level::SECTION),
                asset_type: asset_type.filter(|_| level == Level::ASSET),
            })
    }

    /// Tree shape as a list of parent picks.
    ///
    /// Entry `i` names the node it hangs under: `0` is the org root and
    /// `k > 0` is the `(k-1)`-th earlier entry, taken modulo the entries
    /// available so far. Consumers skip picks that would exceed level 7.
    pub fn arb_tree_shape(max_nodes: usize) -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(0usize..64, 1..=max_nodes)
    }

    pub fn arb_new_planning_group() -> impl Strategy<Value = NewPlanningGroup> {
        (arb_code(), arb_name()).prop_map(|(code, name)| NewPlanningGroup::new(code, name))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;
    use chrono::Utc;

    /// Default config with every limit at its default.
    pub fn test_config() -> OrgScopeConfig {
        OrgScopeConfig::default()
    }

    /// Config with the scope commit mode overridden.
    pub fn config_with_commit_mode(mode: ScopeCommitMode) -> OrgScopeConfig {
        OrgScopeConfig {
            scope_commit_mode: mode,
            ..OrgScopeConfig::default()
        }
    }

    pub fn memory_store() -> InMemoryDocumentStore {
        InMemoryDocumentStore::new()
    }

    /// Path from a chain of ids.
    #[track_caller]
    pub fn path(ids: &[&str]) -> NodePath {
        NodePath::from_ids(ids.iter().copied()).expect("fixture ids are valid")
    }

    /// In-memory node value at `ids`, not persisted.
    #[track_caller]
    pub fn node(ids: &[&str], name: &str) -> HierarchyNode {
        let path = path(ids);
        let now = Utc::now();
        HierarchyNode {
            id: path.id().expect("fixture path is not the root").to_string(),
            name: name.to_string(),
            code: name.chars().filter(char::is_ascii_alphanumeric).take(8).collect(),
            level: path.level().expect("fixture path is not the root"),
            path,
            section_type: None,
            asset_type: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Assignment for the section at `ids` (five ids, site at index 2).
    #[track_caller]
    pub fn assignment(ids: &[&str; 5], section_name: &str) -> SectionAssignment {
        let site = node(&ids[..3], "Site");
        let department = node(&ids[..4], "Department");
        let section = node(&ids[..], section_name);
        SectionAssignment::from_nodes(&site, &department, &section)
            .expect("fixture chain is consistent")
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on `OrgResult` variants.

    use super::*;

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &OrgResult<T>, entity_type: EntityType) {
        match result {
            Err(OrgError::NotFound(e)) => {
                assert_eq!(e.entity_type, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", entity_type, other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &OrgResult<T>) {
        match result {
            Err(OrgError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_conflict<T: std::fmt::Debug>(result: &OrgResult<T>) {
        match result {
            Err(OrgError::Conflict(_)) => {}
            other => panic!("Expected Conflict error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &OrgResult<T>) {
        match result {
            Err(OrgError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }
}
