//! Selector references from `__objc_selrefs`.

use tracing::{debug, trace};

use crate::analysis::Analyzer;
use crate::analyzers::{section_bounds, slots};
use crate::config::ObjcConfig;
use crate::error::Result;
use crate::io::SharedReader;
use crate::model::{EntityKind, SelectorInfo, SharedAnalysisInfo};

const SLOT_SIZE: u64 = 8;

pub struct SelectorAnalyzer {
    info: SharedAnalysisInfo,
    reader: SharedReader,
    config: ObjcConfig,
}

impl SelectorAnalyzer {
    pub fn new(info: SharedAnalysisInfo, reader: SharedReader, config: ObjcConfig) -> Self {
        Self {
            info,
            reader,
            config,
        }
    }
}

impl Analyzer for SelectorAnalyzer {
    fn name(&self) -> &str {
        "selectors"
    }

    fn run(&mut self) -> Result<()> {
        let mut reader = self.reader.borrow_mut();
        let Some((start, end)) = section_bounds(&*reader, &self.config.selrefs_section) else {
            return Ok(());
        };

        let mut added = 0usize;
        let mut unnamed = 0usize;
        for address in slots(start, end, SLOT_SIZE) {
            if self.info.borrow().entity_at(EntityKind::Selector, address).is_some() {
                continue;
            }
            let name_address = reader.read_pointer_at(address, self.config.pointer_mask)?;
            // Names outside the image stay unknown; the resolver may fill them later.
            let name = reader
                .read_c_string_at(name_address, self.config.max_string_len)
                .ok();
            if name.is_none() {
                unnamed += 1;
            }
            trace!(address, name_address, name = ?name, "selector reference");

            let committed = self.info.borrow_mut().commit_selector(SelectorInfo {
                address,
                name_address,
                name,
                origin: self.name().to_string(),
            });
            if committed.is_new() {
                added += 1;
            }
        }
        debug!(added, unnamed, "selector references committed");
        Ok(())
    }
}
