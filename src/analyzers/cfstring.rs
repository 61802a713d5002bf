//! Constant string literals from `__cfstring`.
//!
//! Each entry is a 32-byte structure `{isa, info, data, length}`. When the
//! info word carries the unicode bit the data is `length` UTF-16LE code
//! units, otherwise `length` bytes.

use tracing::{debug, trace};

use crate::analysis::Analyzer;
use crate::analyzers::{section_bounds, slots};
use crate::config::ObjcConfig;
use crate::error::Result;
use crate::io::{BinaryReader, SharedReader};
use crate::model::{CfStringInfo, EntityKind, SharedAnalysisInfo};

const ENTRY_SIZE: u64 = 0x20;
const UNICODE_FLAG: u64 = 0x10;

pub struct CfStringAnalyzer {
    info: SharedAnalysisInfo,
    reader: SharedReader,
    config: ObjcConfig,
}

impl CfStringAnalyzer {
    pub fn new(info: SharedAnalysisInfo, reader: SharedReader, config: ObjcConfig) -> Self {
        Self {
            info,
            reader,
            config,
        }
    }

    fn read_value(
        &self,
        reader: &mut dyn BinaryReader,
        data: u64,
        length: u64,
        flags: u64,
    ) -> Result<String> {
        let length = (length as usize).min(self.config.max_string_len);
        if flags & UNICODE_FLAG != 0 {
            let bytes = reader.read_bytes_at(data, length * 2)?;
            let (text, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(&bytes);
            Ok(text.into_owned())
        } else {
            let bytes = reader.read_bytes_at(data, length)?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

impl Analyzer for CfStringAnalyzer {
    fn name(&self) -> &str {
        "cfstrings"
    }

    fn run(&mut self) -> Result<()> {
        let mut reader = self.reader.borrow_mut();
        let Some((start, end)) = section_bounds(&*reader, &self.config.cfstring_section) else {
            return Ok(());
        };

        let mut added = 0usize;
        for address in slots(start, end, ENTRY_SIZE) {
            if self.info.borrow().entity_at(EntityKind::CfString, address).is_some() {
                continue;
            }
            let flags = reader.read_long_at(address + 0x08)?;
            let data = reader.read_pointer_at(address + 0x10, self.config.pointer_mask)?;
            let length = reader.read_long_at(address + 0x18)?;

            let value = match self.read_value(&mut *reader, data, length, flags) {
                Ok(v) => v,
                Err(e) => {
                    debug!(address, data, error = %e, "unreadable string data; skipping");
                    continue;
                }
            };
            trace!(address, value = %value, "cfstring");

            let committed = self.info.borrow_mut().commit_cfstring(CfStringInfo {
                address,
                data_address: data,
                length,
                value,
                origin: self.name().to_string(),
            });
            if committed.is_new() {
                added += 1;
            }
        }
        debug!(added, "cfstrings committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{self, ImageReader, Section};
    use crate::model::AnalysisInfo;

    fn entry(buf: &mut [u8], at: usize, flags: u64, data: u64, len: u64) {
        buf[at + 8..at + 16].copy_from_slice(&flags.to_le_bytes());
        buf[at + 16..at + 24].copy_from_slice(&data.to_le_bytes());
        buf[at + 24..at + 32].copy_from_slice(&len.to_le_bytes());
    }

    fn image() -> ImageReader {
        let mut buf = vec![0u8; 0x200];
        // 8-bit literal
        entry(&mut buf, 0x00, 0x7c8, 0x1100, 5);
        buf[0x100..0x106].copy_from_slice(b"hello\0");
        // UTF-16 literal
        entry(&mut buf, 0x20, 0x7d0, 0x1120, 2);
        buf[0x120..0x124].copy_from_slice(&[0xe9, 0x00, 0x74, 0x00]);
        // Data pointer outside the image
        entry(&mut buf, 0x40, 0x7c8, 0x9000, 3);
        ImageReader::new(0x1000, buf)
            .with_sections(vec![Section::new("__cfstring", 0x1000, 0x1060)])
            .unwrap()
    }

    #[test]
    fn decodes_both_encodings_and_skips_bad_data() {
        let info = AnalysisInfo::shared();
        let reader = io::share(image());
        let mut pass = CfStringAnalyzer::new(info.clone(), reader, ObjcConfig::default());
        pass.run().unwrap();

        let info = info.borrow();
        let values: Vec<_> = info.cfstrings().map(|(_, s)| s.value.clone()).collect();
        assert_eq!(values, ["hello", "\u{e9}t"]);
        assert!(info.cfstrings().all(|(_, s)| s.origin == "cfstrings"));
    }

    #[test]
    fn values_are_capped_at_max_string_len() {
        let info = AnalysisInfo::shared();
        let config = ObjcConfig {
            max_string_len: 3,
            ..ObjcConfig::default()
        };
        let mut pass = CfStringAnalyzer::new(info.clone(), io::share(image()), config);
        pass.run().unwrap();

        let info = info.borrow();
        let values: Vec<_> = info.cfstrings().map(|(_, s)| s.value.clone()).collect();
        // The UTF-16 literal is two code units long and unaffected.
        assert_eq!(values, ["hel", "\u{e9}t"]);
        // The recorded length is the one stored in the image.
        assert_eq!(info.cfstrings().next().map(|(_, s)| s.length), Some(5));
    }

    #[test]
    fn rerun_adds_nothing() {
        let info = AnalysisInfo::shared();
        let reader = io::share(image());
        let mut pass = CfStringAnalyzer::new(info.clone(), reader, ObjcConfig::default());
        pass.run().unwrap();
        pass.run().unwrap();
        assert_eq!(info.borrow().counts().cfstrings, 2);
    }

    #[test]
    fn missing_section_is_not_an_error() {
        let info = AnalysisInfo::shared();
        let reader = io::share(ImageReader::new(0x1000, vec![0u8; 0x10]));
        let mut pass = CfStringAnalyzer::new(info.clone(), reader, ObjcConfig::default());
        pass.run().unwrap();
        assert!(info.borrow().is_empty());
    }
}
