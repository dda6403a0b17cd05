//! Bounded hierarchy level.
//!
//! A `Level` can only hold 1..=7. Runtime values go through [`Level::new`];
//! literal levels use the associated constants or [`Level::of`], which fails
//! to compile for an out-of-range literal.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Depth of a node in the organizational tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

struct AssertInRange<const N: u8>;

impl<const N: u8> AssertInRange<N> {
    const OK: () = assert!(N >= Level::MIN && N <= Level::MAX, "level out of range");
}

impl Level {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 7;

    pub const COMPANY: Level = Level(1);
    pub const DIVISION: Level = Level(2);
    pub const SITE: Level = Level(3);
    pub const DEPARTMENT: Level = Level(4);
    pub const SECTION: Level = Level(5);
    pub const ASSET: Level = Level(6);
    pub const ASSEMBLY: Level = Level(7);

    /// Validate a runtime level.
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Level(value))
        } else {
            Err(ValidationError::LevelOutOfRange { level: value })
        }
    }

    /// Level from a literal, checked at compile time.
    pub const fn of<const N: u8>() -> Level {
        #[allow(clippy::let_unit_value)]
        let () = AssertInRange::<N>::OK;
        Level(N)
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub fn next(self) -> Option<Level> {
        Level::new(self.0 + 1).ok()
    }

    pub fn previous(self) -> Option<Level> {
        Level::new(self.0.saturating_sub(1)).ok()
    }

    pub fn is_deepest(self) -> bool {
        self.0 == Self::MAX
    }

    pub fn kind(self) -> LevelKind {
        match self.0 {
            1 => LevelKind::Company,
            2 => LevelKind::Division,
            3 => LevelKind::Site,
            4 => LevelKind::Department,
            5 => LevelKind::Section,
            6 => LevelKind::Asset,
            _ => LevelKind::Assembly,
        }
    }

    /// Collection segment under a parent document, e.g. `level_3`.
    pub fn collection_segment(self) -> String {
        format!("level_{}", self.0)
    }

    /// Parse a `level_k` segment.
    pub fn from_segment(segment: &str) -> Option<Level> {
        segment
            .strip_prefix("level_")
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(|n| Level::new(n).ok())
    }

    /// All levels, coarsest first.
    pub fn all() -> impl Iterator<Item = Level> {
        (Self::MIN..=Self::MAX).map(Level)
    }

    /// Levels strictly below this one, in descending-depth discovery order
    /// (`k+1` first).
    pub fn deeper(self) -> impl Iterator<Item = Level> {
        (self.0 + 1..=Self::MAX).map(Level)
    }
}

impl TryFrom<u8> for Level {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Level::new(value)
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a level represents in the organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum LevelKind {
    Company,
    Division,
    Site,
    Department,
    Section,
    Asset,
    Assembly,
}

impl LevelKind {
    pub fn label(&self) -> &'static str {
        match self {
            LevelKind::Company => "Company",
            LevelKind::Division => "Division",
            LevelKind::Site => "Site",
            LevelKind::Department => "Department",
            LevelKind::Section => "Section",
            LevelKind::Asset => "Asset",
            LevelKind::Assembly => "Assembly",
        }
    }
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
