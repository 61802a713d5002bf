//! Shared helpers for integration tests.
//!
//! `ObjcImage` lays out a small synthetic image containing the three
//! Objective-C runtime tables the passes read, so tests can run the whole
//! pipeline without sample binaries.

#![allow(dead_code)]

use objrecon::io::{ImageReader, Section};

pub const BASE: u64 = 0x10_0000;
pub const SIZE: usize = 0x1000;

pub const CFSTRING: u64 = BASE;
pub const SELREFS: u64 = BASE + 0x100;
pub const CLASSLIST: u64 = BASE + 0x180;
pub const CLASSES: u64 = BASE + 0x200;
pub const RO_DATA: u64 = BASE + 0x400;
pub const METHOD_LISTS: u64 = BASE + 0x600;
pub const STRINGS: u64 = BASE + 0x800;

/// Byte buffer addressed from `BASE`.
pub struct Image {
    pub bytes: Vec<u8>,
}

impl Image {
    pub fn new() -> Self {
        Self {
            bytes: vec![0u8; SIZE],
        }
    }

    fn at(addr: u64) -> usize {
        (addr - BASE) as usize
    }

    pub fn u32(&mut self, addr: u64, v: u32) {
        let at = Self::at(addr);
        self.bytes[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn u64(&mut self, addr: u64, v: u64) {
        let at = Self::at(addr);
        self.bytes[at..at + 8].copy_from_slice(&v.to_le_bytes());
    }

    pub fn c_str(&mut self, addr: u64, s: &str) {
        let at = Self::at(addr);
        self.bytes[at..at + s.len()].copy_from_slice(s.as_bytes());
        self.bytes[at + s.len()] = 0;
    }
}

/// Builds the synthetic Objective-C image.
pub struct ObjcImage {
    image: Image,
    cfstrings: u64,
    selrefs: u64,
    classes: u64,
    ro: u64,
    lists: u64,
    strings: u64,
}

impl ObjcImage {
    pub fn new() -> Self {
        Self {
            image: Image::new(),
            cfstrings: 0,
            selrefs: 0,
            classes: 0,
            ro: 0,
            lists: 0,
            strings: STRINGS,
        }
    }

    fn string(&mut self, s: &str) -> u64 {
        let addr = self.strings;
        self.image.c_str(addr, s);
        self.strings += s.len() as u64 + 1;
        addr
    }

    pub fn cfstring(&mut self, value: &str) -> u64 {
        let data = self.string(value);
        let entry = CFSTRING + self.cfstrings * 0x20;
        self.image.u64(entry + 0x08, 0x7c8);
        self.image.u64(entry + 0x10, data);
        self.image.u64(entry + 0x18, value.len() as u64);
        self.cfstrings += 1;
        entry
    }

    /// Add a selector reference; returns the address of the reference slot.
    pub fn selector(&mut self, name: &str) -> u64 {
        let target = self.string(name);
        let slot = SELREFS + self.selrefs * 8;
        self.image.u64(slot, target);
        self.selrefs += 1;
        slot
    }

    /// Add a class with an absolute method list of `(selector, imp)` pairs.
    pub fn class(&mut self, name: &str, superclass: u64, methods: &[(&str, u64)]) -> u64 {
        let class = CLASSES + self.classes * 0x28;
        let ro = RO_DATA + self.ro * 0x48;
        let list = METHOD_LISTS + self.lists;
        let name_addr = self.string(name);

        self.image.u64(CLASSLIST + self.classes * 8, class);
        self.image.u64(class + 0x08, superclass);
        self.image.u64(class + 0x20, ro);
        self.image.u64(ro + 0x18, name_addr);
        if !methods.is_empty() {
            self.image.u64(ro + 0x20, list);
            self.image.u32(list, 24);
            self.image.u32(list + 4, methods.len() as u32);
            for (i, (sel, imp)) in methods.iter().enumerate() {
                let sel_addr = self.string(sel);
                let types = self.string("v16@0:8");
                let entry = list + 8 + i as u64 * 24;
                self.image.u64(entry, sel_addr);
                self.image.u64(entry + 8, types);
                self.image.u64(entry + 16, *imp);
            }
            self.lists += 8 + methods.len() as u64 * 24;
        }
        self.classes += 1;
        self.ro += 1;
        class
    }

    /// Add a class whose method list uses relative entries through `selref`.
    pub fn relative_class(&mut self, name: &str, selref: u64, imp: u64) -> u64 {
        let class = CLASSES + self.classes * 0x28;
        let ro = RO_DATA + self.ro * 0x48;
        let list = METHOD_LISTS + self.lists;
        let name_addr = self.string(name);
        let types = self.string("@16@0:8");

        self.image.u64(CLASSLIST + self.classes * 8, class);
        self.image.u64(class + 0x20, ro);
        self.image.u64(ro + 0x18, name_addr);
        self.image.u64(ro + 0x20, list);
        self.image.u32(list, 0x8000_0000 | 12);
        self.image.u32(list + 4, 1);
        let entry = list + 8;
        for (field, target) in [(entry, selref), (entry + 4, types), (entry + 8, imp)] {
            self.image
                .u32(field, (target as i64 - field as i64) as i32 as u32);
        }
        self.lists += 8 + 12;
        self.classes += 1;
        self.ro += 1;
        class
    }

    pub fn build(self) -> ImageReader {
        let mut sections = vec![Section::new("__objc_methname", STRINGS, BASE + SIZE as u64)];
        if self.cfstrings > 0 {
            sections.push(Section::new("__cfstring", CFSTRING, CFSTRING + self.cfstrings * 0x20));
        }
        if self.selrefs > 0 {
            sections.push(Section::new("__objc_selrefs", SELREFS, SELREFS + self.selrefs * 8));
        }
        if self.classes > 0 {
            sections.push(Section::new(
                "__objc_classlist",
                CLASSLIST,
                CLASSLIST + self.classes * 8,
            ));
        }
        ImageReader::new(BASE, self.image.bytes)
            .with_sections(sections)
            .expect("synthetic section table is valid")
    }
}
