//! Entity types recovered from Objective-C runtime metadata.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinds of entities the result model stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// Constant `CFString`/`NSString` literal
    CfString,
    /// Selector reference
    Selector,
    /// Class
    Class,
    /// Method of a class
    Method,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::CfString => write!(f, "CfString"),
            EntityKind::Selector => write!(f, "Selector"),
            EntityKind::Class => write!(f, "Class"),
            EntityKind::Method => write!(f, "Method"),
        }
    }
}

/// Stable handle to a committed entity.
///
/// Handles stay valid for the lifetime of the model; entities are never
/// removed or reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub kind: EntityKind,
    pub index: u32,
}

impl EntityId {
    pub(crate) fn new(kind: EntityKind, index: usize) -> Self {
        Self {
            kind,
            index: index as u32,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.index)
    }
}

/// Outcome of committing an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Committed {
    /// A new entity was added
    New(EntityId),
    /// An entity already existed at that address; nothing was changed
    Existing(EntityId),
}

impl Committed {
    pub fn id(&self) -> EntityId {
        match self {
            Committed::New(id) | Committed::Existing(id) => *id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Committed::New(_))
    }
}

/// A constant string from the `__cfstring` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfStringInfo {
    /// Address of the CFString structure
    pub address: u64,
    /// Address of the character data
    pub data_address: u64,
    /// Length in characters (bytes or UTF-16 code units)
    pub length: u64,
    pub value: String,
    /// Pass that committed the entity
    pub origin: String,
}

/// A selector reference from `__objc_selrefs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorInfo {
    /// Address of the selector reference slot
    pub address: u64,
    /// Address of the selector name string
    pub name_address: u64,
    /// Selector name; `None` until known
    pub name: Option<String>,
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Address of the `class_t` structure
    pub address: u64,
    /// Address of the `class_ro_t` structure
    pub data_address: u64,
    pub name: String,
    /// Superclass pointer when bound in the image
    pub superclass: Option<u64>,
    /// Methods committed for this class, in method-list order
    pub methods: Vec<EntityId>,
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    /// Address of the method-list entry
    pub address: u64,
    /// Owning class
    pub class: Option<EntityId>,
    pub selector_name: Option<String>,
    /// Selector reference slot used by relative method lists
    pub selector_ref: Option<u64>,
    /// Objective-C type encoding
    pub types: Option<String>,
    /// Implementation address
    pub implementation: u64,
    pub origin: String,
}
