//! Two editors working on scopes at the same time.
//!
//! Drafts are opened before either side commits, which is the
//! read-then-write window the commit modes differ on.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use orgscope_events::AuditTrail;
use orgscope_planning::{AssignmentStatus, OrgScope};
use orgscope_storage::{CommitReceipt, Document, DocumentStore, StoreStatistics, WriteBatch};
use orgscope_test_utils::fixtures::config_with_commit_mode;
use orgscope_test_utils::*;

struct Fixture {
    org: OrgScope,
    site: HierarchyNode,
    department: HierarchyNode,
    sections: Vec<HierarchyNode>,
    g1: String,
    g2: String,
}

async fn fixture(mode: ScopeCommitMode) -> OrgResult<Fixture> {
    fixture_on(Arc::new(InMemoryDocumentStore::new()), mode).await
}

async fn fixture_on(store: Arc<dyn DocumentStore>, mode: ScopeCommitMode) -> OrgResult<Fixture> {
    init_test_tracing();
    let org = OrgScope::new(store, config_with_commit_mode(mode), AuditTrail::disabled())?;

    let mut parent = NodePath::root();
    let mut chain = Vec::new();
    for level in 1u8..=4 {
        let node = org
            .nodes
            .create_node(&parent, level, NewNode::new(format!("N{}", level), format!("N{}", level)))
            .await?;
        parent = node.path.clone();
        chain.push(node);
    }
    let mut sections = Vec::new();
    for name in ["S1", "S2"] {
        sections.push(org.nodes.create_node(&parent, 5, NewNode::new(name, name)).await?);
    }
    let g1 = org.groups.create(NewPlanningGroup::new("MECH", "Mechanical")).await?.id;
    let g2 = org.groups.create(NewPlanningGroup::new("ELEC", "Electrical")).await?.id;

    Ok(Fixture {
        site: chain[2].clone(),
        department: chain[3].clone(),
        sections,
        g1,
        g2,
        org,
    })
}

fn claimants(groups: &[orgscope_core::PlanningGroup], section_id: &str) -> usize {
    groups.iter().filter(|g| g.claims(section_id)).count()
}

#[tokio::test]
async fn unchecked_commits_can_double_claim() -> OrgResult<()> {
    let f = fixture(ScopeCommitMode::Unchecked).await?;
    let s1 = &f.sections[0];

    let mut a = f.org.scope.open_draft(&f.g1).await?;
    let mut b = f.org.scope.open_draft(&f.g2).await?;
    f.org.scope.add_section(&mut a, &f.site, &f.department, s1)?;
    f.org.scope.add_section(&mut b, &f.site, &f.department, s1)?;

    f.org.scope.commit(&mut a).await?;
    f.org.scope.commit(&mut b).await?;

    let groups = f.org.groups.list().await?;
    assert_eq!(claimants(&groups, &s1.id), 2);
    Ok(())
}

#[tokio::test]
async fn checked_commit_rejects_section_claimed_meanwhile() -> OrgResult<()> {
    let f = fixture(ScopeCommitMode::Checked).await?;
    let s1 = &f.sections[0];

    let mut a = f.org.scope.open_draft(&f.g1).await?;
    let mut b = f.org.scope.open_draft(&f.g2).await?;
    f.org.scope.add_section(&mut a, &f.site, &f.department, s1)?;
    f.org.scope.add_section(&mut b, &f.site, &f.department, s1)?;

    f.org.scope.commit(&mut a).await?;
    let err = f.org.scope.commit(&mut b).await.unwrap_err();
    match &err {
        OrgError::Conflict(ConflictError::SectionUnavailable { section_ids }) => {
            assert_eq!(section_ids, &vec![s1.id.clone()]);
        }
        other => panic!("expected SectionUnavailable, got {:?}", other),
    }
    assert!(err.is_retryable());
    assert!(err.user_message().contains("no longer available"));

    let groups = f.org.groups.list().await?;
    assert_eq!(claimants(&groups, &s1.id), 1);

    // The failed commit refreshed the draft's view of the other groups.
    assert_eq!(b.claimed_by(&s1.id).map(|g| g.id.as_str()), Some(f.g1.as_str()));
    assert!(f.org.scope.remove_section(&mut b, &s1.id));
    f.org.scope.add_section(&mut b, &f.site, &f.department, &f.sections[1])?;
    f.org.scope.commit(&mut b).await?;
    Ok(())
}

#[tokio::test]
async fn refresh_reports_conflicts_before_commit() -> OrgResult<()> {
    let f = fixture(ScopeCommitMode::Checked).await?;
    let s1 = &f.sections[0];

    let mut a = f.org.scope.open_draft(&f.g1).await?;
    let mut b = f.org.scope.open_draft(&f.g2).await?;
    f.org.scope.add_section(&mut a, &f.site, &f.department, s1)?;
    f.org.scope.add_section(&mut b, &f.site, &f.department, s1)?;
    f.org.scope.commit(&mut a).await?;

    assert_eq!(f.org.scope.refresh(&mut b).await?, vec![s1.id.clone()]);
    assert_eq!(b.sections().len(), 1);
    let offered = f.org.scope.available_sections(&b, &f.department.path).await?;
    assert!(offered.is_empty());
    Ok(())
}

#[tokio::test]
async fn checked_commit_detects_same_group_edits() -> OrgResult<()> {
    let f = fixture(ScopeCommitMode::Checked).await?;

    let mut first = f.org.scope.open_draft(&f.g1).await?;
    let mut second = f.org.scope.open_draft(&f.g1).await?;
    f.org.scope.add_section(&mut first, &f.site, &f.department, &f.sections[0])?;
    f.org.scope.add_section(&mut second, &f.site, &f.department, &f.sections[1])?;

    f.org.scope.commit(&mut first).await?;
    let result = f.org.scope.commit(&mut second).await;
    assert!(matches!(
        result,
        Err(OrgError::Conflict(ConflictError::ConcurrentModification {
            entity_type: EntityType::PlanningGroup,
            ..
        }))
    ));

    let group = f.org.groups.get(&f.g1).await?;
    assert_eq!(group.section_ids().collect::<Vec<_>>(), vec![f.sections[0].id.as_str()]);
    Ok(())
}

#[tokio::test]
async fn unchecked_commit_is_last_write_wins() -> OrgResult<()> {
    let f = fixture(ScopeCommitMode::Unchecked).await?;

    let mut first = f.org.scope.open_draft(&f.g1).await?;
    let mut second = f.org.scope.open_draft(&f.g1).await?;
    f.org.scope.add_section(&mut first, &f.site, &f.department, &f.sections[0])?;
    f.org.scope.add_section(&mut second, &f.site, &f.department, &f.sections[1])?;

    f.org.scope.commit(&mut first).await?;
    f.org.scope.commit(&mut second).await?;

    let group = f.org.groups.get(&f.g1).await?;
    assert_eq!(group.section_ids().collect::<Vec<_>>(), vec![f.sections[1].id.as_str()]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn racing_checked_commits_admit_one_claim() -> OrgResult<()> {
    let f = fixture(ScopeCommitMode::Checked).await?;
    let s1 = f.sections[0].clone();

    let mut a = f.org.scope.open_draft(&f.g1).await?;
    let mut b = f.org.scope.open_draft(&f.g2).await?;
    f.org.scope.add_section(&mut a, &f.site, &f.department, &s1)?;
    f.org.scope.add_section(&mut b, &f.site, &f.department, &s1)?;

    let engine_a = f.org.scope.clone();
    let engine_b = f.org.scope.clone();
    let task_a = tokio::spawn(async move { engine_a.commit(&mut a).await });
    let task_b = tokio::spawn(async move { engine_b.commit(&mut b).await });
    let results = [
        task_a.await.expect("commit task panicked"),
        task_b.await.expect("commit task panicked"),
    ];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in &results {
        if let Err(e) = result {
            assert!(e.is_retryable(), "unexpected error: {:?}", e);
        }
    }
    let groups = f.org.groups.list().await?;
    assert_eq!(claimants(&groups, &s1.id), 1);
    Ok(())
}

#[tokio::test]
async fn open_draft_goes_stale_after_cleanup() -> OrgResult<()> {
    let f = fixture(ScopeCommitMode::Checked).await?;

    let mut draft = f.org.scope.open_draft(&f.g1).await?;
    f.org.scope.add_section(&mut draft, &f.site, &f.department, &f.sections[0])?;
    f.org.scope.commit(&mut draft).await?;

    f.org.scope.add_section(&mut draft, &f.site, &f.department, &f.sections[1])?;
    f.org.deleter.delete_subtree(&f.sections[0].path).await?;

    let result = f.org.scope.commit(&mut draft).await;
    assert!(matches!(
        result,
        Err(OrgError::Conflict(ConflictError::ConcurrentModification { .. }))
    ));
    assert!(f.org.groups.get(&f.g1).await?.assigned_sections.is_empty());
    Ok(())
}

#[tokio::test]
async fn checked_commit_refuses_deleted_section() -> OrgResult<()> {
    let f = fixture(ScopeCommitMode::Checked).await?;

    let mut draft = f.org.scope.open_draft(&f.g1).await?;
    f.org.scope.add_section(&mut draft, &f.site, &f.department, &f.sections[1])?;
    f.org.deleter.delete_subtree(&f.sections[1].path).await?;

    let result = f.org.scope.commit(&mut draft).await;
    assert!(matches!(
        result,
        Err(OrgError::NotFound(ref e)) if e.entity_type == EntityType::HierarchyNode
    ));
    Ok(())
}

/// Store that deletes a queued path right before the next batch writing
/// `trigger` is applied, as a cascade committed by another session would.
struct DeleteBeforeCommit {
    inner: InMemoryDocumentStore,
    trigger: String,
    pending: Mutex<Option<String>>,
}

impl DeleteBeforeCommit {
    fn new(trigger: String) -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            trigger,
            pending: Mutex::new(None),
        }
    }

    fn delete_on_next_commit(&self, path: &str) {
        *self.pending.lock().unwrap() = Some(path.to_string());
    }
}

#[async_trait]
impl DocumentStore for DeleteBeforeCommit {
    async fn get(&self, path: &str) -> OrgResult<Option<Document>> {
        self.inner.get(path).await
    }

    async fn list(&self, collection: &str) -> OrgResult<Vec<Document>> {
        self.inner.list(collection).await
    }

    async fn commit(&self, batch: WriteBatch) -> OrgResult<CommitReceipt> {
        let touches_trigger = batch.ops().iter().any(|op| op.path() == self.trigger);
        let pending = if touches_trigger {
            self.pending.lock().unwrap().take()
        } else {
            None
        };
        if let Some(path) = pending {
            let mut delete = WriteBatch::new();
            delete.require_exists(path.clone()).delete(path);
            self.inner.commit(delete).await?;
        }
        self.inner.commit(batch).await
    }

    async fn health_check(&self) -> OrgResult<bool> {
        self.inner.health_check().await
    }

    async fn statistics(&self) -> OrgResult<StoreStatistics> {
        self.inner.statistics().await
    }

    fn max_batch_operations(&self) -> usize {
        self.inner.max_batch_operations()
    }
}

#[tokio::test]
async fn checked_commit_loses_to_delete_landing_first() -> OrgResult<()> {
    let ledger = config_with_commit_mode(ScopeCommitMode::Checked).scope_ledger_path();
    let store = Arc::new(DeleteBeforeCommit::new(ledger));
    let f = fixture_on(store.clone(), ScopeCommitMode::Checked).await?;
    let s2 = &f.sections[1];

    let mut draft = f.org.scope.open_draft(&f.g1).await?;
    f.org.scope.add_section(&mut draft, &f.site, &f.department, s2)?;
    store.delete_on_next_commit(&s2.path.to_string());

    let result = f.org.scope.commit(&mut draft).await;
    assert!(matches!(
        result,
        Err(OrgError::NotFound(ref e)) if e.entity_type == EntityType::HierarchyNode
    ));
    assert!(store.get(&s2.path.to_string()).await?.is_none());

    let resolved = f.org.groups.resolve_assignments(&f.g1).await?;
    assert!(resolved.iter().all(|r| r.status != AssignmentStatus::Deleted));
    assert!(f.org.groups.get(&f.g1).await?.assigned_sections.is_empty());
    Ok(())
}
