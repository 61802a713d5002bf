//! The shared result model of an analysis run.
//!
//! `AnalysisInfo` accumulates what every pass discovers. Its rules:
//!
//! - Entities are identified by `(kind, address)`. Committing an entity
//!   whose identity already exists returns the existing handle and leaves
//!   the stored entity untouched, which makes re-running a pass harmless.
//! - References are append-only; duplicates are dropped.
//! - The only in-place updates fill fields that are still unknown
//!   (`fill_selector_name`); nothing a pass committed is ever replaced.

pub mod entity;
pub mod reference;

use serde::Serialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

pub use crate::model::entity::{
    CfStringInfo, ClassInfo, Committed, EntityId, EntityKind, MethodInfo, SelectorInfo,
};
pub use crate::model::reference::{RefKind, Reference, Target};

/// The model as shared by every pass in one run.
pub type SharedAnalysisInfo = Rc<RefCell<AnalysisInfo>>;

/// Entity and reference counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModelCounts {
    pub cfstrings: usize,
    pub selectors: usize,
    pub classes: usize,
    pub methods: usize,
    pub references: usize,
}

/// Accumulated analysis state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisInfo {
    cfstrings: Vec<CfStringInfo>,
    selectors: Vec<SelectorInfo>,
    classes: Vec<ClassInfo>,
    methods: Vec<MethodInfo>,
    references: Vec<Reference>,
    /// Selector name -> implementation addresses
    implementations: BTreeMap<String, Vec<u64>>,
    #[serde(skip)]
    by_address: HashMap<(EntityKind, u64), EntityId>,
    #[serde(skip)]
    reference_set: HashSet<Reference>,
}

impl AnalysisInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh model for sharing across passes.
    pub fn shared() -> SharedAnalysisInfo {
        Rc::new(RefCell::new(Self::new()))
    }

    fn intern(&mut self, kind: EntityKind, address: u64, len: usize) -> Committed {
        match self.by_address.get(&(kind, address)) {
            Some(id) => Committed::Existing(*id),
            None => {
                let id = EntityId::new(kind, len);
                self.by_address.insert((kind, address), id);
                Committed::New(id)
            }
        }
    }

    pub fn commit_cfstring(&mut self, info: CfStringInfo) -> Committed {
        let c = self.intern(EntityKind::CfString, info.address, self.cfstrings.len());
        if c.is_new() {
            self.cfstrings.push(info);
        }
        c
    }

    pub fn commit_selector(&mut self, info: SelectorInfo) -> Committed {
        let c = self.intern(EntityKind::Selector, info.address, self.selectors.len());
        if c.is_new() {
            self.selectors.push(info);
        }
        c
    }

    pub fn commit_class(&mut self, info: ClassInfo) -> Committed {
        let c = self.intern(EntityKind::Class, info.address, self.classes.len());
        if c.is_new() {
            self.classes.push(info);
        }
        c
    }

    /// Commit a method; a new method is appended to its owning class.
    pub fn commit_method(&mut self, info: MethodInfo) -> Committed {
        let c = self.intern(EntityKind::Method, info.address, self.methods.len());
        if let Committed::New(id) = c {
            if let Some(class) = info.class.and_then(|cid| self.class_mut(cid)) {
                class.methods.push(id);
            }
            self.methods.push(info);
        }
        c
    }

    /// Handle of the entity of `kind` committed at `address`.
    pub fn entity_at(&self, kind: EntityKind, address: u64) -> Option<EntityId> {
        self.by_address.get(&(kind, address)).copied()
    }

    pub fn cfstring(&self, id: EntityId) -> Option<&CfStringInfo> {
        (id.kind == EntityKind::CfString)
            .then(|| self.cfstrings.get(id.index as usize))
            .flatten()
    }

    pub fn selector(&self, id: EntityId) -> Option<&SelectorInfo> {
        (id.kind == EntityKind::Selector)
            .then(|| self.selectors.get(id.index as usize))
            .flatten()
    }

    pub fn class(&self, id: EntityId) -> Option<&ClassInfo> {
        (id.kind == EntityKind::Class)
            .then(|| self.classes.get(id.index as usize))
            .flatten()
    }

    fn class_mut(&mut self, id: EntityId) -> Option<&mut ClassInfo> {
        if id.kind != EntityKind::Class {
            return None;
        }
        self.classes.get_mut(id.index as usize)
    }

    pub fn method(&self, id: EntityId) -> Option<&MethodInfo> {
        (id.kind == EntityKind::Method)
            .then(|| self.methods.get(id.index as usize))
            .flatten()
    }

    pub fn class_by_name(&self, name: &str) -> Option<EntityId> {
        self.classes
            .iter()
            .position(|c| c.name == name)
            .map(|i| EntityId::new(EntityKind::Class, i))
    }

    /// Name of the selector referenced through the slot at `address`.
    pub fn selector_name_at(&self, address: u64) -> Option<&str> {
        self.entity_at(EntityKind::Selector, address)
            .and_then(|id| self.selector(id))
            .and_then(|s| s.name.as_deref())
    }

    pub fn cfstrings(&self) -> impl Iterator<Item = (EntityId, &CfStringInfo)> {
        enumerate(EntityKind::CfString, &self.cfstrings)
    }

    pub fn selectors(&self) -> impl Iterator<Item = (EntityId, &SelectorInfo)> {
        enumerate(EntityKind::Selector, &self.selectors)
    }

    pub fn classes(&self) -> impl Iterator<Item = (EntityId, &ClassInfo)> {
        enumerate(EntityKind::Class, &self.classes)
    }

    pub fn methods(&self) -> impl Iterator<Item = (EntityId, &MethodInfo)> {
        enumerate(EntityKind::Method, &self.methods)
    }

    /// Fill in a selector's name if it is still unknown.
    ///
    /// Returns `true` if the name was set.
    pub fn fill_selector_name(&mut self, id: EntityId, name: &str) -> bool {
        if id.kind != EntityKind::Selector {
            return false;
        }
        match self.selectors.get_mut(id.index as usize) {
            Some(sel) if sel.name.is_none() => {
                sel.name = Some(name.to_string());
                true
            }
            _ => false,
        }
    }

    /// Append a reference. Returns `false` if an identical one exists.
    pub fn add_reference(&mut self, reference: Reference) -> bool {
        if !self.reference_set.insert(reference) {
            return false;
        }
        self.references.push(reference);
        true
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn references_from(&self, from: EntityId) -> impl Iterator<Item = &Reference> {
        self.references.iter().filter(move |r| r.from == from)
    }

    /// Unresolved references with no resolved counterpart appended since.
    pub fn unresolved_references(&self) -> Vec<Reference> {
        self.references
            .iter()
            .filter(|r| match r.target {
                Target::Entity(_) => false,
                Target::Unresolved { kind, address } => match self.entity_at(kind, address) {
                    Some(id) => !self
                        .reference_set
                        .contains(&Reference::to_entity(r.from, id, r.kind)),
                    None => true,
                },
            })
            .copied()
            .collect()
    }

    /// Record `address` as an implementation of `selector`.
    pub fn record_implementation(&mut self, selector: &str, address: u64) {
        let imps = self.implementations.entry(selector.to_string()).or_default();
        if !imps.contains(&address) {
            imps.push(address);
        }
    }

    /// Known implementations of `selector`, i.e. candidate targets of a
    /// dynamic dispatch with that selector.
    pub fn implementations(&self, selector: &str) -> &[u64] {
        self.implementations
            .get(selector)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn counts(&self) -> ModelCounts {
        ModelCounts {
            cfstrings: self.cfstrings.len(),
            selectors: self.selectors.len(),
            classes: self.classes.len(),
            methods: self.methods.len(),
            references: self.references.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts() == ModelCounts::default() && self.implementations.is_empty()
    }

    /// Serialize the model for an external consumer.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn enumerate<T>(kind: EntityKind, items: &[T]) -> impl Iterator<Item = (EntityId, &T)> {
    items
        .iter()
        .enumerate()
        .map(move |(i, item)| (EntityId::new(kind, i), item))
}
