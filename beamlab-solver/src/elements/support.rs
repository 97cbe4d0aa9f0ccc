//! Support conditions

use serde::{Deserialize, Serialize};

/// Bitmask of restrained degrees of freedom at a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Restraints(u8);

impl Restraints {
    /// Horizontal (axial) translation
    pub const TX: Restraints = Restraints(0b001);
    /// Vertical translation
    pub const TY: Restraints = Restraints(0b010);
    /// Rotation about the out-of-plane axis
    pub const RZ: Restraints = Restraints(0b100);

    /// Check whether every bit of `other` is restrained
    pub const fn contains(self, other: Restraints) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two masks
    pub const fn union(self, other: Restraints) -> Self {
        Restraints(self.0 | other.0)
    }
}

impl std::ops::BitOr for Restraints {
    type Output = Restraints;

    fn bitor(self, rhs: Restraints) -> Restraints {
        self.union(rhs)
    }
}

/// Kind of support a user can place on the span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportKind {
    /// Translations restrained, rotation free
    Pinned,
    /// Vertical translation restrained only
    Roller,
    /// All DOFs restrained
    Fixed,
}

impl SupportKind {
    /// Fixed bitmask of restrained DOFs for this kind
    pub const fn restraints(self) -> Restraints {
        match self {
            SupportKind::Pinned => Restraints(Restraints::TX.0 | Restraints::TY.0),
            SupportKind::Roller => Restraints::TY,
            SupportKind::Fixed => {
                Restraints(Restraints::TX.0 | Restraints::TY.0 | Restraints::RZ.0)
            }
        }
    }

    /// Whether the support resists rotation (and so carries a reaction moment)
    pub const fn restrains_rotation(self) -> bool {
        self.restraints().contains(Restraints::RZ)
    }
}

/// A support placed on the span
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Support {
    /// Distance from the left end of the span
    pub position: f64,
    /// Support kind
    pub kind: SupportKind,
}

impl Support {
    /// Create a new support
    pub fn new(position: f64, kind: SupportKind) -> Self {
        Self { position, kind }
    }

    /// Create a pinned support
    pub fn pinned(position: f64) -> Self {
        Self::new(position, SupportKind::Pinned)
    }

    /// Create a roller support
    pub fn roller(position: f64) -> Self {
        Self::new(position, SupportKind::Roller)
    }

    /// Create a fixed support
    pub fn fixed(position: f64) -> Self {
        Self::new(position, SupportKind::Fixed)
    }

    /// Restrained DOF bitmask of this support
    pub fn restraints(&self) -> Restraints {
        self.kind.restraints()
    }
}
