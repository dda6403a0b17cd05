//! Scope assignment engine.
//!
//! A group's scope is the set of sections it claims; a section belongs to at
//! most one group. Editing happens on a caller-owned [`ScopeDraft`]: adding
//! and removing sections only touch the draft, and [`ScopeEngine::commit`]
//! is the single write.
//!
//! In `Checked` mode the commit re-reads every group, rejects sections
//! claimed elsewhere and guards the write with version preconditions on the
//! edited group and on the module's scope ledger. Every checked commit bumps
//! the ledger, so two checked commits that read the same state cannot both
//! land. `Unchecked` mode writes the draft as-is and keeps the
//! read-then-write race.

use std::collections::HashSet;

use chrono::Utc;
use orgscope_core::{
    ConflictError, EntityType, HierarchyNode, NodePath, NotFoundError, OrgError, OrgResult,
    OrgScopeConfig, PlanningGroup, ScopeCommitMode, SectionAssignment, StorageError,
};
use orgscope_events::{AuditAction, AuditTrail};
use orgscope_hierarchy::NodeRepository;
use orgscope_storage::WriteBatch;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::record::{scope_fields, VersionedGroup};
use crate::repository::{concurrent_on_precondition, PlanningGroupRepository};

/// Section ids the group `self_group_id` may not add: every section claimed
/// by another group plus the ones already in its draft.
pub fn compute_forbidden_set(
    all_groups: &[PlanningGroup],
    draft_sections: &[SectionAssignment],
    self_group_id: &str,
) -> HashSet<String> {
    all_groups
        .iter()
        .filter(|g| g.id != self_group_id)
        .flat_map(|g| g.section_ids())
        .chain(draft_sections.iter().map(|s| s.l5_id.as_str()))
        .map(str::to_string)
        .collect()
}

/// Uncommitted scope edits for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeDraft {
    group: PlanningGroup,
    version: u64,
    sections: Vec<SectionAssignment>,
    others: Vec<PlanningGroup>,
}

impl ScopeDraft {
    pub fn group_id(&self) -> &str {
        &self.group.id
    }

    /// The group as it was when the draft was opened or last committed.
    pub fn baseline(&self) -> &PlanningGroup {
        &self.group
    }

    /// Store version the draft is based on.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn sections(&self) -> &[SectionAssignment] {
        &self.sections
    }

    /// Other groups as of the last load or refresh.
    pub fn other_groups(&self) -> &[PlanningGroup] {
        &self.others
    }

    pub fn forbidden_set(&self) -> HashSet<String> {
        compute_forbidden_set(&self.others, &self.sections, &self.group.id)
    }

    /// The other group claiming `section_id`, if any.
    pub fn claimed_by(&self, section_id: &str) -> Option<&PlanningGroup> {
        self.others.iter().find(|g| g.claims(section_id))
    }

    /// Whether the draft differs from the baseline.
    pub fn is_dirty(&self) -> bool {
        self.sections != self.group.assigned_sections
    }

    /// Sections in the draft but not in the baseline.
    pub fn added(&self) -> Vec<&SectionAssignment> {
        self.sections
            .iter()
            .filter(|s| !self.group.claims(&s.l5_id))
            .collect()
    }

    /// Baseline sections dropped from the draft.
    pub fn removed(&self) -> Vec<&SectionAssignment> {
        self.group
            .assigned_sections
            .iter()
            .filter(|s| !self.sections.iter().any(|d| d.l5_id == s.l5_id))
            .collect()
    }

    /// Append a section if no group claims it and it is not already in the
    /// draft.
    pub fn add_section(
        &mut self,
        site: &HierarchyNode,
        department: &HierarchyNode,
        section: &HierarchyNode,
    ) -> OrgResult<&SectionAssignment> {
        let assignment = SectionAssignment::from_nodes(site, department, section)?;
        if self.forbidden_set().contains(&assignment.l5_id) {
            debug!(group = %self.group.id, section = %assignment.l5_id, "section unavailable");
            return Err(ConflictError::SectionUnavailable {
                section_ids: vec![assignment.l5_id],
            }
            .into());
        }
        let index = self.sections.len();
        self.sections.push(assignment);
        Ok(&self.sections[index])
    }

    /// Drop the section with id `section_id`. Returns whether it was present.
    pub fn remove_section(&mut self, section_id: &str) -> bool {
        let before = self.sections.len();
        self.sections.retain(|s| s.l5_id != section_id);
        self.sections.len() != before
    }

    /// Draft section ids another group now claims.
    pub fn conflicts(&self) -> Vec<String> {
        self.sections
            .iter()
            .filter(|s| self.claimed_by(&s.l5_id).is_some())
            .map(|s| s.l5_id.clone())
            .collect()
    }
}

/// Loads, edits and commits group scopes.
#[derive(Clone, Debug)]
pub struct ScopeEngine {
    groups: PlanningGroupRepository,
    nodes: NodeRepository,
    mode: ScopeCommitMode,
    ledger_path: String,
    audit: AuditTrail,
}

impl ScopeEngine {
    pub fn new(
        groups: PlanningGroupRepository,
        nodes: NodeRepository,
        config: &OrgScopeConfig,
    ) -> Self {
        Self {
            groups,
            nodes,
            mode: config.scope_commit_mode,
            ledger_path: config.scope_ledger_path(),
            audit: AuditTrail::default(),
        }
    }

    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    pub fn mode(&self) -> ScopeCommitMode {
        self.mode
    }

    /// Start editing `group_id`'s scope.
    pub async fn open_draft(&self, group_id: &str) -> OrgResult<ScopeDraft> {
        let (own, others) = self.load_split(group_id).await?;
        debug!(group = %group_id, sections = own.group.assigned_sections.len(), others = others.len(), "opened scope draft");
        Ok(ScopeDraft {
            sections: own.group.assigned_sections.clone(),
            group: own.group,
            version: own.version,
            others: others.into_iter().map(|v| v.group).collect(),
        })
    }

    /// Add a section to the draft. See [`ScopeDraft::add_section`].
    pub fn add_section<'d>(
        &self,
        draft: &'d mut ScopeDraft,
        site: &HierarchyNode,
        department: &HierarchyNode,
        section: &HierarchyNode,
    ) -> OrgResult<&'d SectionAssignment> {
        draft.add_section(site, department, section)
    }

    /// Remove a section from the draft. A second call is a no-op.
    pub fn remove_section(&self, draft: &mut ScopeDraft, section_id: &str) -> bool {
        draft.remove_section(section_id)
    }

    /// Sections under `department` the draft may still add.
    pub async fn available_sections(
        &self,
        draft: &ScopeDraft,
        department: &NodePath,
    ) -> OrgResult<Vec<HierarchyNode>> {
        let forbidden = draft.forbidden_set();
        let sections = self.nodes.list_children(department, 5).await?;
        Ok(sections
            .into_iter()
            .filter(|s| !forbidden.contains(&s.id))
            .collect())
    }

    /// Reload the other groups' claims. Returns draft sections now claimed
    /// elsewhere. The draft's own sections and baseline are left alone.
    pub async fn refresh(&self, draft: &mut ScopeDraft) -> OrgResult<Vec<String>> {
        let (_, others) = self.load_split(&draft.group.id).await?;
        draft.others = others.into_iter().map(|v| v.group).collect();
        Ok(draft.conflicts())
    }

    /// Persist the draft's sections as the group's scope.
    pub async fn commit(&self, draft: &mut ScopeDraft) -> OrgResult<PlanningGroup> {
        let group_id = draft.group.id.clone();
        let path = self.groups.group_path(&group_id);
        let now = Utc::now();

        let mut batch = WriteBatch::new();
        match self.mode {
            ScopeCommitMode::Unchecked => {
                batch.update(path.clone(), scope_fields(&draft.sections, now)?);
            }
            ScopeCommitMode::Checked => {
                let ledger_version = self
                    .groups
                    .store()
                    .get(&self.ledger_path)
                    .await?
                    .map(|doc| doc.version);
                let (own, others) = self.load_split(&group_id).await?;
                draft.others = others.into_iter().map(|v| v.group).collect();

                if own.version != draft.version {
                    warn!(group = %group_id, expected = draft.version, found = own.version, "group changed since draft was opened");
                    return Err(ConflictError::ConcurrentModification {
                        entity_type: EntityType::PlanningGroup,
                        id: group_id,
                    }
                    .into());
                }
                let conflicts = draft.conflicts();
                if !conflicts.is_empty() {
                    warn!(group = %group_id, ?conflicts, "scope commit rejected, sections claimed elsewhere");
                    return Err(ConflictError::SectionUnavailable {
                        section_ids: conflicts,
                    }
                    .into());
                }
                for added in draft.added() {
                    if self.groups.store().get(&added.path).await?.is_none() {
                        return Err(
                            NotFoundError::new(EntityType::HierarchyNode, added.path.clone()).into(),
                        );
                    }
                }

                // The reads above only fail fast; a cascade delete may land
                // before the batch does.
                for added in draft.added() {
                    batch.require_exists(added.path.clone());
                }
                batch
                    .require_version(path.clone(), own.version)
                    .update(path.clone(), scope_fields(&draft.sections, now)?);
                match ledger_version {
                    Some(version) => batch.require_version(self.ledger_path.clone(), version),
                    None => batch.require_missing(self.ledger_path.clone()),
                };
                batch.set(
                    self.ledger_path.clone(),
                    json!({ "lastGroupId": group_id, "committedAt": now }),
                );
            }
        }

        let added_paths: HashSet<String> =
            draft.added().iter().map(|s| s.path.clone()).collect();
        let receipt = self.groups.store().commit(batch).await.map_err(|e| match e {
            OrgError::Storage(StorageError::PreconditionFailed { ref path, .. })
                if added_paths.contains(path) =>
            {
                warn!(group = %group_id, section = %path, "section deleted before scope commit landed");
                NotFoundError::new(EntityType::HierarchyNode, path.clone()).into()
            }
            OrgError::Storage(StorageError::PreconditionFailed { .. })
                if self.mode == ScopeCommitMode::Unchecked =>
            {
                NotFoundError::new(EntityType::PlanningGroup, group_id.clone()).into()
            }
            other => concurrent_on_precondition(other, &group_id),
        })?;

        let added: Vec<String> = draft.added().iter().map(|s| s.l5_id.clone()).collect();
        let removed: Vec<String> = draft.removed().iter().map(|s| s.l5_id.clone()).collect();

        draft.group.assigned_sections = draft.sections.clone();
        draft.group.updated_at = now;
        draft.version = receipt.version_of(&path).unwrap_or(draft.version + 1);

        info!(
            group = %group_id,
            mode = %self.mode,
            sections = draft.sections.len(),
            added = added.len(),
            removed = removed.len(),
            "committed scope"
        );
        self.audit.record(
            AuditAction::ScopeCommitted,
            EntityType::PlanningGroup,
            group_id,
            json!({ "mode": self.mode, "added": added, "removed": removed }),
        );
        Ok(draft.group.clone())
    }

    /// Load `group_id` and split it from the rest of the module's groups.
    async fn load_split(&self, group_id: &str) -> OrgResult<(VersionedGroup, Vec<VersionedGroup>)> {
        let (own, others): (Vec<_>, Vec<_>) = self
            .groups
            .list_versioned()
            .await?
            .into_iter()
            .partition(|v| v.group.id == group_id);
        let own = own
            .into_iter()
            .next()
            .ok_or_else(|| NotFoundError::new(EntityType::PlanningGroup, group_id))?;
        Ok((own, others))
    }
}

// ============================================================================
// TESTS
// ============================================================================
