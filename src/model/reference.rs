//! Cross-references between entities.
//!
//! References are append-only and name their endpoints by `EntityId`, so
//! later insertions never invalidate them. A reference whose target has not
//! been committed yet points at an address instead.

use serde::{Deserialize, Serialize};

use crate::model::entity::{EntityId, EntityKind};

/// Relationship carried by a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefKind {
    /// Class owns a method
    Contains,
    /// Method is named by a selector reference
    UsesSelector,
    /// Class inherits from another class
    Superclass,
}

/// Target of a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// Committed entity
    Entity(EntityId),
    /// Entity of `kind` expected at `address` but not (yet) committed
    Unresolved { kind: EntityKind, address: u64 },
}

impl Target {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Target::Entity(_))
    }

    pub fn entity(&self) -> Option<EntityId> {
        match self {
            Target::Entity(id) => Some(*id),
            Target::Unresolved { .. } => None,
        }
    }
}

/// A directed edge `from -> target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub from: EntityId,
    pub target: Target,
    pub kind: RefKind,
}

impl Reference {
    pub fn new(from: EntityId, target: Target, kind: RefKind) -> Self {
        Self { from, target, kind }
    }

    pub fn to_entity(from: EntityId, to: EntityId, kind: RefKind) -> Self {
        Self::new(from, Target::Entity(to), kind)
    }

    pub fn unresolved(
        from: EntityId,
        kind: RefKind,
        target_kind: EntityKind,
        address: u64,
    ) -> Self {
        Self::new(
            from,
            Target::Unresolved {
                kind: target_kind,
                address,
            },
            kind,
        )
    }
}
