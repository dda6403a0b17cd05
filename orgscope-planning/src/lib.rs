//! OrgScope Planning - Planning Groups and Scope Assignment
//!
//! Planning groups own sets of sections (level 5 nodes). A section is in at
//! most one group's scope.
//!
//! - [`PlanningGroupRepository`]: CRUD, code pre-check, generated codes
//! - [`ScopeEngine`] and [`ScopeDraft`]: forbidden-set computation, local
//!   edits, one commit per draft
//! - [`PlanningReferenceCleaner`]: strips references to deleted sections
//!   inside the cascading delete batch
//! - [`OrgScope`]: all of the above wired over one store

mod cleanup;
mod record;
mod repository;
mod scope;
mod service;

pub use cleanup::PlanningReferenceCleaner;
pub use record::{group_body, group_from_document, VersionedGroup};
pub use repository::{AssignmentStatus, PlanningGroupRepository, ResolvedAssignment};
pub use scope::{compute_forbidden_set, ScopeDraft, ScopeEngine};
pub use service::OrgScope;

// ============================================================================
// PROPERTY TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use orgscope_core::{HierarchyNode, NewNode, NewPlanningGroup, NodePath, OrgScopeConfig};
    use orgscope_events::AuditTrail;
    use orgscope_test_utils::InMemoryDocumentStore;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    const GROUPS: usize = 3;
    const SECTIONS: usize = 6;

    #[derive(Debug, Clone)]
    enum Edit {
        Add { group: usize, section: usize },
        Remove { group: usize, section: usize },
    }

    fn arb_edit() -> impl Strategy<Value = Edit> {
        prop_oneof![
            (0..GROUPS, 0..SECTIONS).prop_map(|(group, section)| Edit::Add { group, section }),
            (0..GROUPS, 0..SECTIONS).prop_map(|(group, section)| Edit::Remove { group, section }),
        ]
    }

    struct World {
        org: OrgScope,
        site: HierarchyNode,
        department: HierarchyNode,
        sections: Vec<HierarchyNode>,
        group_ids: Vec<String>,
    }

    async fn world() -> World {
        let store = InMemoryDocumentStore::new();
        let org = OrgScope::new(
            Arc::new(store),
            OrgScopeConfig::default(),
            AuditTrail::disabled(),
        )
        .expect("default config is valid");

        let mut parent = NodePath::root();
        let mut chain = Vec::new();
        for (level, name) in (1u8..=4).zip(["Co", "Div", "Site", "Dept"]) {
            let node = org
                .nodes
                .create_node(&parent, level, NewNode::new(name, name))
                .await
                .expect("create should succeed");
            parent = node.path.clone();
            chain.push(node);
        }
        let mut sections = Vec::new();
        for i in 0..SECTIONS {
            sections.push(
                org.nodes
                    .create_node(&parent, 5, NewNode::new(format!("S{}", i), format!("S{}", i)))
                    .await
                    .expect("create should succeed"),
            );
        }
        let mut group_ids = Vec::new();
        for i in 0..GROUPS {
            let group = org
                .groups
                .create(NewPlanningGroup::new(format!("G{}", i), format!("Group {}", i)))
                .await
                .expect("create should succeed");
            group_ids.push(group.id);
        }
        World {
            org,
            site: chain[2].clone(),
            department: chain[3].clone(),
            sections,
            group_ids,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        /// With commits applied one at a time, no section is ever claimed by
        /// two groups, and an add succeeds exactly when nobody holds the
        /// section.
        #[test]
        fn prop_serialized_commits_keep_scopes_exclusive(edits in prop::collection::vec(arb_edit(), 1..30)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime should build");
            rt.block_on(async {
                let w = world().await;
                let mut owner: HashMap<usize, usize> = HashMap::new();

                for edit in &edits {
                    match *edit {
                        Edit::Add { group, section } => {
                            let mut draft = w.org.scope.open_draft(&w.group_ids[group]).await.unwrap();
                            let added = draft
                                .add_section(&w.site, &w.department, &w.sections[section])
                                .is_ok();
                            prop_assert_eq!(added, !owner.contains_key(&section));
                            if added {
                                w.org.scope.commit(&mut draft).await.unwrap();
                                owner.insert(section, group);
                            }
                        }
                        Edit::Remove { group, section } => {
                            let mut draft = w.org.scope.open_draft(&w.group_ids[group]).await.unwrap();
                            let removed = draft.remove_section(&w.sections[section].id);
                            prop_assert_eq!(removed, owner.get(&section) == Some(&group));
                            w.org.scope.commit(&mut draft).await.unwrap();
                            if removed {
                                owner.remove(&section);
                            }
                        }
                    }
                }

                let groups = w.org.groups.list().await.unwrap();
                let mut seen: HashMap<String, String> = HashMap::new();
                for group in &groups {
                    for id in group.section_ids() {
                        prop_assert!(seen.insert(id.to_string(), group.id.clone()).is_none());
                    }
                }
                prop_assert_eq!(seen.len(), owner.len());
                Ok(())
            })?;
        }
    }
}
