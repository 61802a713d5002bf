//! Classes and their methods from `__objc_classlist`.
//!
//! Layouts (64-bit):
//!
//! ```text
//! class_t     { isa, superclass, cache, vtable, data }          data & !0x7 -> class_ro_t
//! class_ro_t  { flags: u32, instance_start: u32, instance_size: u32, reserved: u32,
//!               ivar_layout, name, base_methods, ... }           name @ 0x18, methods @ 0x20
//! method_list { entsize_and_flags: u32, count: u32, entries[count] }
//! ```
//!
//! Absolute method entries are three pointers `{name, types, imp}`.
//! Relative entries are three `i32` offsets, each relative to its own field;
//! the name offset points at a selector reference (or, with
//! `SELECTORS_DIRECT`, straight at the name).

use bitflags::bitflags;
use tracing::{debug, trace, warn};

use crate::analysis::Analyzer;
use crate::analyzers::{section_bounds, slots};
use crate::config::ObjcConfig;
use crate::error::{AnalysisError, Result};
use crate::io::{BinaryReader, SharedReader};
use crate::model::{
    AnalysisInfo, ClassInfo, EntityId, EntityKind, MethodInfo, RefKind, Reference,
    SharedAnalysisInfo,
};

const CLASS_SUPERCLASS: u64 = 0x08;
const CLASS_DATA: u64 = 0x20;
const CLASS_DATA_MASK: u64 = !0x7;
const RO_NAME: u64 = 0x18;
const RO_BASE_METHODS: u64 = 0x20;

const METHOD_LIST_HEADER: u64 = 8;
const ENTSIZE_MASK: u32 = 0x0000_fffc;
const ABSOLUTE_ENTSIZE: u64 = 24;
const RELATIVE_ENTSIZE: u64 = 12;
const MAX_METHODS: u32 = 0x1_0000;

bitflags! {
    /// Flags stored in the high bits of a method list's `entsize_and_flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodListFlags: u32 {
        /// Name offsets of relative entries point at the selector string
        /// itself rather than at a selector reference.
        ///
        /// Offsets are resolved against the field address. Method lists
        /// inside a dyld shared cache resolve direct selectors against the
        /// cache's relative-method selector base instead, so images extracted
        /// from a shared cache yield wrong names here.
        const SELECTORS_DIRECT = 0x4000_0000;
        const RELATIVE = 0x8000_0000;
    }
}

/// A method entry as read from the image, before committing.
struct RawMethod {
    address: u64,
    selector_name: Option<String>,
    selector_ref: Option<u64>,
    types: Option<String>,
    implementation: u64,
}

pub struct ClassAnalyzer {
    info: SharedAnalysisInfo,
    reader: SharedReader,
    config: ObjcConfig,
}

impl ClassAnalyzer {
    pub fn new(info: SharedAnalysisInfo, reader: SharedReader, config: ObjcConfig) -> Self {
        Self {
            info,
            reader,
            config,
        }
    }

    fn pointer(&self, reader: &mut dyn BinaryReader, at: u64) -> Result<u64> {
        Ok(reader.read_pointer_at(at, self.config.pointer_mask)?)
    }

    fn string(&self, reader: &mut dyn BinaryReader, at: u64) -> Option<String> {
        if at == 0 {
            return None;
        }
        reader.read_c_string_at(at, self.config.max_string_len).ok()
    }

    fn analyze_class(
        &self,
        reader: &mut dyn BinaryReader,
        info: &mut AnalysisInfo,
        address: u64,
    ) -> Result<EntityId> {
        let superclass = self.pointer(reader, address + CLASS_SUPERCLASS)?;
        let data_address = self.pointer(reader, address + CLASS_DATA)? & CLASS_DATA_MASK;
        let name_address = self.pointer(reader, data_address + RO_NAME)?;
        let name = reader.read_c_string_at(name_address, self.config.max_string_len)?;
        let methods_address = self.pointer(reader, data_address + RO_BASE_METHODS)?;

        // Read everything before committing so a malformed class leaves no trace.
        let methods = if methods_address != 0 {
            self.read_method_list(reader, methods_address)?
        } else {
            Vec::new()
        };
        trace!(address, name = %name, methods = methods.len(), "class");

        let class_id = info
            .commit_class(ClassInfo {
                address,
                data_address,
                name,
                superclass: (superclass != 0).then_some(superclass),
                methods: Vec::new(),
                origin: self.name().to_string(),
            })
            .id();

        if superclass != 0 {
            let reference = match info.entity_at(EntityKind::Class, superclass) {
                Some(sup) => Reference::to_entity(class_id, sup, RefKind::Superclass),
                None => Reference::unresolved(
                    class_id,
                    RefKind::Superclass,
                    EntityKind::Class,
                    superclass,
                ),
            };
            info.add_reference(reference);
        }

        for m in methods {
            self.commit_method(info, class_id, m);
        }
        Ok(class_id)
    }

    fn read_method_list(&self, reader: &mut dyn BinaryReader, list: u64) -> Result<Vec<RawMethod>> {
        let header = reader.read_int_at(list)?;
        let count = reader.read_int_at(list + 4)?;
        let flags = MethodListFlags::from_bits_truncate(header);
        let entsize = u64::from(header & ENTSIZE_MASK);

        let expected = if flags.contains(MethodListFlags::RELATIVE) {
            RELATIVE_ENTSIZE
        } else {
            ABSOLUTE_ENTSIZE
        };
        if entsize != expected {
            return Err(AnalysisError::malformed(
                list,
                format!("method list entsize {} (expected {})", entsize, expected),
            ));
        }
        if count > MAX_METHODS {
            return Err(AnalysisError::malformed(
                list,
                format!("method list count {} is implausible", count),
            ));
        }

        let mut out = Vec::with_capacity(count as usize);
        for i in 0..u64::from(count) {
            let entry = list + METHOD_LIST_HEADER + i * entsize;
            let method = if flags.contains(MethodListFlags::RELATIVE) {
                self.read_relative_method(reader, entry, flags)?
            } else {
                self.read_absolute_method(reader, entry)?
            };
            out.push(method);
        }
        Ok(out)
    }

    fn read_absolute_method(&self, reader: &mut dyn BinaryReader, entry: u64) -> Result<RawMethod> {
        let name = self.pointer(reader, entry)?;
        let types = self.pointer(reader, entry + 8)?;
        let implementation = self.pointer(reader, entry + 16)?;
        Ok(RawMethod {
            address: entry,
            selector_name: self.string(reader, name),
            selector_ref: None,
            types: self.string(reader, types),
            implementation,
        })
    }

    fn read_relative_method(
        &self,
        reader: &mut dyn BinaryReader,
        entry: u64,
        flags: MethodListFlags,
    ) -> Result<RawMethod> {
        let name = relative(reader, entry)?;
        let types = relative(reader, entry + 4)?;
        let implementation = relative(reader, entry + 8)?;

        let (selector_name, selector_ref) = if flags.contains(MethodListFlags::SELECTORS_DIRECT) {
            (self.string(reader, name), None)
        } else {
            let selector_name = match self.pointer(reader, name) {
                Ok(target) => self.string(reader, target),
                Err(_) => None,
            };
            (selector_name, Some(name))
        };
        Ok(RawMethod {
            address: entry,
            selector_name,
            selector_ref,
            types: self.string(reader, types),
            implementation,
        })
    }

    fn commit_method(&self, info: &mut AnalysisInfo, class_id: EntityId, m: RawMethod) {
        let committed = info.commit_method(MethodInfo {
            address: m.address,
            class: Some(class_id),
            selector_name: m.selector_name.clone(),
            selector_ref: m.selector_ref,
            types: m.types,
            implementation: m.implementation,
            origin: self.name().to_string(),
        });
        let method_id = committed.id();
        info.add_reference(Reference::to_entity(class_id, method_id, RefKind::Contains));

        if let Some(selref) = m.selector_ref {
            let reference = match info.entity_at(EntityKind::Selector, selref) {
                Some(sel) => Reference::to_entity(method_id, sel, RefKind::UsesSelector),
                None => Reference::unresolved(
                    method_id,
                    RefKind::UsesSelector,
                    EntityKind::Selector,
                    selref,
                ),
            };
            info.add_reference(reference);
        }
        if let Some(name) = &m.selector_name {
            info.record_implementation(name, m.implementation);
        }
    }
}

/// Resolve the signed 32-bit offset stored at `field`, relative to `field`.
fn relative(reader: &mut dyn BinaryReader, field: u64) -> Result<u64> {
    let offset = reader.read_int_at(field)? as i32;
    Ok(field.wrapping_add_signed(i64::from(offset)))
}

impl Analyzer for ClassAnalyzer {
    fn name(&self) -> &str {
        "classes"
    }

    fn run(&mut self) -> Result<()> {
        let mut reader = self.reader.borrow_mut();
        let Some((start, end)) = section_bounds(&*reader, &self.config.classlist_section) else {
            return Ok(());
        };

        let mut added = 0usize;
        let mut skipped = 0usize;
        for slot in slots(start, end, 8) {
            let address = self.pointer(&mut *reader, slot)?;
            let mut info = self.info.borrow_mut();
            if info.entity_at(EntityKind::Class, address).is_some() {
                continue;
            }
            match self.analyze_class(&mut *reader, &mut info, address) {
                Ok(_) => added += 1,
                Err(e) => {
                    warn!(slot, address, error = %e, "skipping unreadable class");
                    skipped += 1;
                }
            }
        }
        debug!(added, skipped, "classes committed");
        Ok(())
    }
}
