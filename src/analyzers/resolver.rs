//! Reconciliation pass run after the table walkers.
//!
//! Earlier passes record forward references as unresolved when their target
//! was not committed yet. This pass appends the resolved counterparts, fills
//! selector names learned from method lists, and completes the
//! selector -> implementation index. It never replaces a committed value.

use tracing::debug;

use crate::analysis::Analyzer;
use crate::error::Result;
use crate::model::{AnalysisInfo, EntityKind, Reference, SharedAnalysisInfo, Target};

pub struct ReferenceResolver {
    info: SharedAnalysisInfo,
}

impl ReferenceResolver {
    pub fn new(info: SharedAnalysisInfo) -> Self {
        Self { info }
    }
}

fn resolve_references(info: &mut AnalysisInfo) -> usize {
    let resolved: Vec<Reference> = info
        .unresolved_references()
        .into_iter()
        .filter_map(|r| match r.target {
            Target::Unresolved { kind, address } => info
                .entity_at(kind, address)
                .map(|id| Reference::to_entity(r.from, id, r.kind)),
            Target::Entity(_) => None,
        })
        .collect();
    resolved
        .into_iter()
        .filter(|r| info.add_reference(*r))
        .count()
}

fn fill_selector_names(info: &mut AnalysisInfo) -> usize {
    let names: Vec<_> = info
        .methods()
        .filter_map(|(_, m)| {
            let selref = m.selector_ref?;
            let name = m.selector_name.clone()?;
            Some((selref, name))
        })
        .filter_map(|(selref, name)| {
            info.entity_at(EntityKind::Selector, selref)
                .map(|id| (id, name))
        })
        .collect();
    names
        .into_iter()
        .filter(|(id, name)| info.fill_selector_name(*id, name))
        .count()
}

fn index_implementations(info: &mut AnalysisInfo) {
    let pairs: Vec<(String, u64)> = info
        .methods()
        .filter_map(|(_, m)| {
            let name = m.selector_name.clone().or_else(|| {
                m.selector_ref
                    .and_then(|s| info.selector_name_at(s))
                    .map(str::to_string)
            })?;
            Some((name, m.implementation))
        })
        .collect();
    for (name, imp) in pairs {
        info.record_implementation(&name, imp);
    }
}

impl Analyzer for ReferenceResolver {
    fn name(&self) -> &str {
        "resolver"
    }

    fn run(&mut self) -> Result<()> {
        let mut info = self.info.borrow_mut();
        let references = resolve_references(&mut info);
        let names = fill_selector_names(&mut info);
        index_implementations(&mut info);
        debug!(
            references,
            names,
            remaining = info.unresolved_references().len(),
            "references reconciled"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassInfo, MethodInfo, RefKind, SelectorInfo};

    fn model() -> (AnalysisInfo, crate::model::EntityId) {
        let mut info = AnalysisInfo::new();
        let cls = info
            .commit_class(ClassInfo {
                address: 0x1100,
                data_address: 0x1200,
                name: "Foo".to_string(),
                superclass: None,
                methods: Vec::new(),
                origin: "classes".to_string(),
            })
            .id();
        let method = info
            .commit_method(MethodInfo {
                address: 0x1308,
                class: Some(cls),
                selector_name: None,
                selector_ref: Some(0x1040),
                types: None,
                implementation: 0x2000,
                origin: "classes".to_string(),
            })
            .id();
        info.add_reference(Reference::unresolved(
            method,
            RefKind::UsesSelector,
            EntityKind::Selector,
            0x1040,
        ));
        // Selector pass ran later than the class pass in this model.
        info.commit_selector(SelectorInfo {
            address: 0x1040,
            name_address: 0x13b0,
            name: Some("dealloc".to_string()),
            origin: "selectors".to_string(),
        });
        (info, method)
    }

    #[test]
    fn resolves_forward_references_and_indexes_implementations() {
        let (info, method) = model();
        let shared = std::rc::Rc::new(std::cell::RefCell::new(info));
        let mut pass = ReferenceResolver::new(shared.clone());
        pass.run().unwrap();

        let info = shared.borrow();
        assert!(info.unresolved_references().is_empty());
        let sel = info.entity_at(EntityKind::Selector, 0x1040).unwrap();
        assert!(info
            .references_from(method)
            .any(|r| r.target == Target::Entity(sel)));
        assert_eq!(info.implementations("dealloc"), &[0x2000]);
    }

    #[test]
    fn rerun_is_idempotent() {
        let (info, _) = model();
        let shared = std::rc::Rc::new(std::cell::RefCell::new(info));
        let mut pass = ReferenceResolver::new(shared.clone());
        pass.run().unwrap();
        let refs = shared.borrow().references().len();
        pass.run().unwrap();
        assert_eq!(shared.borrow().references().len(), refs);
        assert_eq!(shared.borrow().implementations("dealloc").len(), 1);
    }

    #[test]
    fn fills_missing_selector_name_from_method() {
        let mut info = AnalysisInfo::new();
        let sel = info
            .commit_selector(SelectorInfo {
                address: 0x1040,
                name_address: 0x9000,
                name: None,
                origin: "selectors".to_string(),
            })
            .id();
        info.commit_method(MethodInfo {
            address: 0x1308,
            class: None,
            selector_name: Some("retain".to_string()),
            selector_ref: Some(0x1040),
            types: None,
            implementation: 0x2000,
            origin: "classes".to_string(),
        });
        assert_eq!(fill_selector_names(&mut info), 1);
        assert_eq!(info.selector(sel).unwrap().name.as_deref(), Some("retain"));
        assert_eq!(fill_selector_names(&mut info), 0);
    }
}
