//! Typed ancestry paths.
//!
//! A node's address is `org/level_1/{id}/level_2/{id}/.../level_k/{id}`.
//! `NodePath` stores only the id chain; the level segments are derived from
//! position, so a path with a mislabelled or skipped level cannot be built.

use crate::{validate_document_id, DocumentId, Level, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Root segment of the organizational tree.
pub const ROOT_SEGMENT: &str = "org";

/// Address of a hierarchy node (or of the org root).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath {
    ids: Vec<DocumentId>,
}

impl NodePath {
    /// The org root (depth 0). Level-1 nodes live directly under it.
    pub fn root() -> Self {
        Self { ids: Vec::new() }
    }

    /// Build a path from an ancestry chain of ids, level 1 first.
    pub fn from_ids<I, S>(ids: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = Self::root();
        for id in ids {
            path = path.child(id)?;
        }
        Ok(path)
    }

    pub fn is_root(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of ancestors plus one; zero for the root.
    pub fn depth(&self) -> u8 {
        self.ids.len() as u8
    }

    /// Level of the addressed node; `None` for the root.
    pub fn level(&self) -> Option<Level> {
        Level::new(self.depth()).ok()
    }

    /// Id of the addressed node; `None` for the root.
    pub fn id(&self) -> Option<&str> {
        self.ids.last().map(String::as_str)
    }

    /// Ancestry chain of ids, level 1 first.
    pub fn ids(&self) -> &[DocumentId] {
        &self.ids
    }

    /// Path of a child one level deeper.
    pub fn child(&self, id: impl Into<String>) -> Result<NodePath, ValidationError> {
        let id = id.into();
        validate_document_id(&id)?;
        if self.depth() >= Level::MAX {
            return Err(ValidationError::LevelOutOfRange {
                level: self.depth() + 1,
            });
        }
        let mut ids = self.ids.clone();
        ids.push(id);
        Ok(Self { ids })
    }

    /// Parent path; `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            ids: self.ids[..self.ids.len() - 1].to_vec(),
        })
    }

    /// Paths of every ancestor from level 1 down to the parent.
    pub fn ancestors(&self) -> Vec<NodePath> {
        (1..self.ids.len())
            .map(|len| Self {
                ids: self.ids[..len].to_vec(),
            })
            .collect()
    }

    /// Ancestor (or self) at the given level.
    pub fn ancestor_at(&self, level: Level) -> Option<NodePath> {
        let len = level.get() as usize;
        if len > self.ids.len() {
            return None;
        }
        Some(Self {
            ids: self.ids[..len].to_vec(),
        })
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        self.ids.len() < other.ids.len() && other.ids.starts_with(&self.ids)
    }

    /// Collection holding this node's children; `None` at level 7.
    pub fn child_collection(&self) -> Option<CollectionPath> {
        let level = Level::new(self.depth() + 1).ok()?;
        Some(CollectionPath {
            parent: self.clone(),
            level,
        })
    }

    /// Collection this node lives in; `None` for the root.
    pub fn parent_collection(&self) -> Option<CollectionPath> {
        let level = self.level()?;
        Some(CollectionPath {
            parent: self.parent()?,
            level,
        })
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ROOT_SEGMENT)?;
        for (index, id) in self.ids.iter().enumerate() {
            write!(f, "/level_{}/{}", index + 1, id)?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidPath {
            path: s.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = s.split('/');
        if segments.next() != Some(ROOT_SEGMENT) {
            return Err(invalid("path must start with 'org'"));
        }

        let rest: Vec<&str> = segments.collect();
        if rest.len() % 2 != 0 {
            return Err(invalid("path must alternate level segments and ids"));
        }

        let mut path = NodePath::root();
        for pair in rest.chunks(2) {
            let expected = path.depth() + 1;
            match Level::from_segment(pair[0]) {
                Some(level) if level.get() == expected => {}
                Some(level) => {
                    return Err(invalid(&format!(
                        "found level_{} where level_{} was expected",
                        level, expected
                    )))
                }
                None => return Err(invalid(&format!("'{}' is not a level segment", pair[0]))),
            }
            path = path
                .child(pair[1])
                .map_err(|e| invalid(&e.to_string()))?;
        }
        Ok(path)
    }
}

impl TryFrom<String> for NodePath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.to_string()
    }
}

/// Address of the collection holding all children of `parent` at `level`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    parent: NodePath,
    level: Level,
}

impl CollectionPath {
    /// Children collection of `parent`. `level` must be the parent's depth plus one.
    pub fn new(parent: NodePath, level: Level) -> Result<Self, ValidationError> {
        let expected = parent.depth() + 1;
        if level.get() != expected {
            return Err(ValidationError::LevelMismatch {
                expected,
                got: level.get(),
            });
        }
        Ok(Self { parent, level })
    }

    pub fn parent(&self) -> &NodePath {
        &self.parent
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// Path of a document in this collection.
    pub fn document(&self, id: impl Into<String>) -> Result<NodePath, ValidationError> {
        self.parent.child(id)
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.parent, self.level.collection_segment())
    }
}
