//! Lazy tree model for a hierarchy browser.
//!
//! `TreeState` belongs to the caller. Expanding a node issues one
//! `list_children` call for that node only; collapsing keeps the loaded
//! children so re-expanding is free until the node is invalidated.

use std::collections::{HashMap, HashSet};

use orgscope_core::{HierarchyNode, NodeAction, NodePath, OrgResult};

use crate::NodeRepository;

/// One renderable row.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeRow {
    pub node: HierarchyNode,
    /// Indentation depth; level-1 rows have depth 1.
    pub depth: u8,
    pub expanded: bool,
    pub expandable: bool,
    pub actions: Vec<NodeAction>,
}

/// Caller-owned expansion state.
#[derive(Debug, Clone, Default)]
pub struct TreeState {
    children: HashMap<NodePath, Vec<HierarchyNode>>,
    expanded: HashSet<NodePath>,
}

impl TreeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the level-1 nodes if they are not loaded yet.
    pub async fn load_roots(&mut self, repo: &NodeRepository) -> OrgResult<()> {
        let root = NodePath::root();
        if !self.children.contains_key(&root) {
            let nodes = repo.list_children(&root, 1).await?;
            self.children.insert(root.clone(), nodes);
        }
        self.expanded.insert(root);
        Ok(())
    }

    /// Expand `path`, loading its children on first expansion.
    ///
    /// Assemblies have no children level and stay collapsed.
    pub async fn expand(&mut self, repo: &NodeRepository, path: &NodePath) -> OrgResult<()> {
        let Some(collection) = path.child_collection() else {
            return Ok(());
        };
        if !self.children.contains_key(path) {
            let nodes = repo
                .list_children(path, collection.level().get())
                .await?;
            self.children.insert(path.clone(), nodes);
        }
        self.expanded.insert(path.clone());
        Ok(())
    }

    /// Collapse `path`. Returns whether it was expanded.
    pub fn collapse(&mut self, path: &NodePath) -> bool {
        self.expanded.remove(path)
    }

    /// Flip `path`'s expansion. Returns the new state.
    pub async fn toggle(&mut self, repo: &NodeRepository, path: &NodePath) -> OrgResult<bool> {
        if self.collapse(path) {
            return Ok(false);
        }
        self.expand(repo, path).await?;
        Ok(self.is_expanded(path))
    }

    /// Forget the loaded children at and beneath `path` and collapse it, so
    /// the next expansion reloads from the store.
    pub fn invalidate(&mut self, path: &NodePath) {
        self.children
            .retain(|p, _| p != path && !path.is_ancestor_of(p));
        self.expanded
            .retain(|p| p != path && !path.is_ancestor_of(p));
    }

    pub fn is_expanded(&self, path: &NodePath) -> bool {
        self.expanded.contains(path)
    }

    /// Loaded children of `path`, if any.
    pub fn children(&self, path: &NodePath) -> Option<&[HierarchyNode]> {
        self.children.get(path).map(Vec::as_slice)
    }

    /// Rows in display order: each expanded node is followed by its children.
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        if self.is_expanded(&NodePath::root()) {
            self.push_rows(&NodePath::root(), &mut rows);
        }
        rows
    }

    fn push_rows(&self, parent: &NodePath, rows: &mut Vec<TreeRow>) {
        let Some(children) = self.children.get(parent) else {
            return;
        };
        for node in children {
            let expanded = self.is_expanded(&node.path);
            rows.push(TreeRow {
                node: node.clone(),
                depth: node.level.get(),
                expanded,
                expandable: node.can_have_children(),
                actions: node.actions(),
            });
            if expanded {
                self.push_rows(&node.path, rows);
            }
        }
    }
}
