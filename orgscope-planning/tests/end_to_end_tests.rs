//! End-to-end flows across the hierarchy and planning crates.

use std::sync::Arc;

use orgscope_events::AuditTrail;
use orgscope_planning::{compute_forbidden_set, OrgScope};
use orgscope_test_utils::assertions::assert_not_found;
use orgscope_test_utils::*;

struct Plant {
    org: OrgScope,
    site: HierarchyNode,
    department: HierarchyNode,
    sections: Vec<HierarchyNode>,
}

fn org() -> OrgResult<OrgScope> {
    init_test_tracing();
    OrgScope::new(
        Arc::new(InMemoryDocumentStore::new()),
        OrgScopeConfig::default(),
        AuditTrail::disabled(),
    )
}

/// Company, division, site and department with `names` as sections.
async fn plant(org: OrgScope, names: &[&str]) -> OrgResult<Plant> {
    let mut parent = NodePath::root();
    let mut chain = Vec::new();
    for (level, name) in (1u8..=4).zip(["Plant A", "Line 1", "North Site", "Maintenance"]) {
        let node = org
            .nodes
            .create_node(&parent, level, NewNode::new(name, format!("L{}", level)))
            .await?;
        parent = node.path.clone();
        chain.push(node);
    }
    let mut sections = Vec::new();
    for name in names {
        sections.push(
            org.nodes
                .create_node(&parent, 5, NewNode::new(*name, *name))
                .await?,
        );
    }
    Ok(Plant {
        site: chain[2].clone(),
        department: chain[3].clone(),
        sections,
        org,
    })
}

fn names(nodes: &[HierarchyNode]) -> Vec<&str> {
    nodes.iter().map(|n| n.name.as_str()).collect()
}

#[tokio::test]
async fn scenario_create_and_list_two_levels() -> OrgResult<()> {
    let org = org()?;
    let plant = org
        .nodes
        .create_node(&NodePath::root(), 1, NewNode::new("Plant A", "PA"))
        .await?;
    org.nodes
        .create_node(&plant.path, 2, NewNode::new("Line 1", "L1"))
        .await?;

    let roots = org.nodes.list_children(&NodePath::root(), 1).await?;
    assert_eq!(names(&roots), vec!["Plant A"]);
    let lines = org.nodes.list_children(&plant.path, 2).await?;
    assert_eq!(names(&lines), vec!["Line 1"]);
    Ok(())
}

#[tokio::test]
async fn scenario_delete_chain_removes_descendants() -> OrgResult<()> {
    let org = org()?;
    let a = org
        .nodes
        .create_node(&NodePath::root(), 1, NewNode::new("A", "A"))
        .await?;
    let b = org.nodes.create_node(&a.path, 2, NewNode::new("B", "B")).await?;
    let c = org.nodes.create_node(&b.path, 3, NewNode::new("C", "C")).await?;

    let report = org.deleter.delete_subtree(&a.path).await?;
    assert_eq!(report.removed.len(), 3);

    assert_not_found(&org.nodes.list_children(&b.path, 3).await, EntityType::HierarchyNode);
    assert_not_found(&org.nodes.list_children(&c.path, 4).await, EntityType::HierarchyNode);
    assert!(org.nodes.list_children(&NodePath::root(), 1).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn scenario_claimed_section_is_forbidden_elsewhere() -> OrgResult<()> {
    let p = plant(org()?, &["S1", "S2"]).await?;
    let g1 = p.org.groups.create(NewPlanningGroup::new("MECH", "Mechanical")).await?;
    let g2 = p.org.groups.create(NewPlanningGroup::new("ELEC", "Electrical")).await?;
    let s1 = &p.sections[0];

    let mut draft = p.org.scope.open_draft(&g1.id).await?;
    p.org.scope.add_section(&mut draft, &p.site, &p.department, s1)?;
    let committed = p.org.scope.commit(&mut draft).await?;
    assert!(committed.claims(&s1.id));

    let all = p.org.groups.list().await?;
    let forbidden = compute_forbidden_set(&all, &[], &g2.id);
    assert!(forbidden.contains(&s1.id));

    let mut other = p.org.scope.open_draft(&g2.id).await?;
    let offered = p.org.scope.available_sections(&other, &p.department.path).await?;
    assert_eq!(names(&offered), vec!["S2"]);

    let attempt = p
        .org
        .scope
        .add_section(&mut other, &p.site, &p.department, s1)
        .map(|_| ());
    assert!(matches!(
        attempt,
        Err(OrgError::Conflict(ConflictError::SectionUnavailable { ref section_ids }))
            if section_ids == &vec![s1.id.clone()]
    ));
    assert!(other.sections().is_empty());
    Ok(())
}

#[tokio::test]
async fn scenario_released_section_can_move() -> OrgResult<()> {
    let p = plant(org()?, &["S1"]).await?;
    let g1 = p.org.groups.create(NewPlanningGroup::new("MECH", "Mechanical")).await?;
    let g2 = p.org.groups.create(NewPlanningGroup::new("ELEC", "Electrical")).await?;
    let s1 = &p.sections[0];

    let mut draft = p.org.scope.open_draft(&g1.id).await?;
    p.org.scope.add_section(&mut draft, &p.site, &p.department, s1)?;
    p.org.scope.commit(&mut draft).await?;

    assert!(p.org.scope.remove_section(&mut draft, &s1.id));
    assert!(!p.org.scope.remove_section(&mut draft, &s1.id));
    p.org.scope.commit(&mut draft).await?;

    let all = p.org.groups.list().await?;
    assert!(!compute_forbidden_set(&all, &[], &g2.id).contains(&s1.id));

    let mut other = p.org.scope.open_draft(&g2.id).await?;
    p.org.scope.add_section(&mut other, &p.site, &p.department, s1)?;
    let g2 = p.org.scope.commit(&mut other).await?;
    assert!(g2.claims(&s1.id));
    assert!(p.org.groups.get(&g1.id).await?.assigned_sections.is_empty());
    Ok(())
}

#[tokio::test]
async fn scenario_create_with_skipped_level_is_rejected() -> OrgResult<()> {
    let org = org()?;
    let plant = org
        .nodes
        .create_node(&NodePath::root(), 1, NewNode::new("Plant A", "PA"))
        .await?;
    let result = org
        .nodes
        .create_node(&plant.path, 3, NewNode::new("Site", "S"))
        .await;
    assert!(matches!(
        result,
        Err(OrgError::Validation(ValidationError::LevelMismatch { expected: 2, got: 3 }))
    ));
    assert!(org.nodes.list_children(&plant.path, 2).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn deleting_a_section_strips_it_from_groups() -> OrgResult<()> {
    let p = plant(org()?, &["S1", "S2"]).await?;
    let group = p.org.groups.create(NewPlanningGroup::new("MECH", "Mechanical")).await?;

    let mut draft = p.org.scope.open_draft(&group.id).await?;
    for section in &p.sections {
        p.org.scope.add_section(&mut draft, &p.site, &p.department, section)?;
    }
    p.org.scope.commit(&mut draft).await?;

    let report = p.org.deleter.delete_subtree(&p.sections[0].path).await?;
    assert_eq!(report.cleanup_ops, 1);

    let group = p.org.groups.get(&group.id).await?;
    let ids: Vec<&str> = group.section_ids().collect();
    assert_eq!(ids, vec![p.sections[1].id.as_str()]);
    Ok(())
}

#[tokio::test]
async fn deleting_a_department_strips_every_section() -> OrgResult<()> {
    let p = plant(org()?, &["S1", "S2", "S3"]).await?;
    let g1 = p.org.groups.create(NewPlanningGroup::new("MECH", "Mechanical")).await?;
    let g2 = p.org.groups.create(NewPlanningGroup::new("ELEC", "Electrical")).await?;

    let mut d1 = p.org.scope.open_draft(&g1.id).await?;
    p.org.scope.add_section(&mut d1, &p.site, &p.department, &p.sections[0])?;
    p.org.scope.commit(&mut d1).await?;
    let mut d2 = p.org.scope.open_draft(&g2.id).await?;
    p.org.scope.add_section(&mut d2, &p.site, &p.department, &p.sections[1])?;
    p.org.scope.commit(&mut d2).await?;

    let report = p.org.deleter.delete_subtree(&p.department.path).await?;
    assert_eq!(report.removed_sections.len(), 3);
    assert_eq!(report.cleanup_ops, 2);
    for group in p.org.groups.list().await? {
        assert!(group.assigned_sections.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn disabled_cleanup_leaves_stale_references() -> OrgResult<()> {
    let config = OrgScopeConfig {
        cleanup_group_references_on_delete: false,
        ..OrgScopeConfig::default()
    };
    let org = OrgScope::new(
        Arc::new(InMemoryDocumentStore::new()),
        config,
        AuditTrail::disabled(),
    )?;
    let p = plant(org, &["S1"]).await?;
    let group = p.org.groups.create(NewPlanningGroup::new("MECH", "Mechanical")).await?;

    let mut draft = p.org.scope.open_draft(&group.id).await?;
    p.org.scope.add_section(&mut draft, &p.site, &p.department, &p.sections[0])?;
    p.org.scope.commit(&mut draft).await?;

    let report = p.org.deleter.delete_subtree(&p.sections[0].path).await?;
    assert_eq!(report.cleanup_ops, 0);

    let resolved = p.org.groups.resolve_assignments(&group.id).await?;
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].status, orgscope_planning::AssignmentStatus::Deleted);
    Ok(())
}

#[tokio::test]
async fn deleting_a_group_releases_its_sections() -> OrgResult<()> {
    let p = plant(org()?, &["S1"]).await?;
    let g1 = p.org.groups.create(NewPlanningGroup::new("MECH", "Mechanical")).await?;
    let g2 = p.org.groups.create(NewPlanningGroup::new("ELEC", "Electrical")).await?;

    let mut draft = p.org.scope.open_draft(&g1.id).await?;
    p.org.scope.add_section(&mut draft, &p.site, &p.department, &p.sections[0])?;
    p.org.scope.commit(&mut draft).await?;
    p.org.groups.delete(&g1.id).await?;

    let other = p.org.scope.open_draft(&g2.id).await?;
    let offered = p.org.scope.available_sections(&other, &p.department.path).await?;
    assert_eq!(offered.len(), 1);
    Ok(())
}
