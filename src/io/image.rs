//! In-memory image backend.
//!
//! `ImageReader` maps a contiguous byte buffer at a base address. It is the
//! backend used when a host has already loaded the image (or the relevant
//! portion of it) into memory, and the one used throughout the tests.

use bytes::Bytes;
use tracing::debug;

use crate::io::error::{ImageError, Result};
use crate::io::section::{Section, SectionTable};
use crate::io::{check_range, BinaryReader};

/// A flat image occupying `[base, base + data.len())`.
#[derive(Debug, Clone)]
pub struct ImageReader {
    base: u64,
    data: Bytes,
    sections: SectionTable,
    cursor: u64,
}

impl ImageReader {
    /// Create a reader with no sections; the cursor starts at `base`.
    pub fn new(base: u64, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        debug!(base, size = data.len(), "opening in-memory image");
        Self {
            base,
            data,
            sections: SectionTable::default(),
            cursor: base,
        }
    }

    /// Attach a section table, validating it against the image bounds.
    pub fn with_sections(
        mut self,
        sections: Vec<Section>,
    ) -> std::result::Result<Self, ImageError> {
        let table = SectionTable::new(sections)?;
        let (start, end) = self.bounds();
        if let Some(s) = table.iter().find(|s| s.start < start || s.end > end) {
            return Err(ImageError::InvalidSectionTable(format!(
                "section {} lies outside image [{:#x}, {:#x})",
                s, start, end
            )));
        }
        self.sections = table;
        Ok(self)
    }

    pub fn sections(&self) -> &SectionTable {
        &self.sections
    }

    fn end(&self) -> u64 {
        self.base.saturating_add(self.data.len() as u64)
    }

    /// Borrow `N` bytes at the cursor and advance past them.
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        check_range(self.cursor, N as u64, self.base, self.end())?;
        let at = (self.cursor - self.base) as usize;
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.data[at..at + N]);
        self.cursor += N as u64;
        Ok(buf)
    }
}

impl BinaryReader for ImageReader {
    fn seek(&mut self, offset: u64) -> Result<()> {
        check_range(offset, 1, self.base, self.end())?;
        self.cursor = offset;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.cursor
    }

    fn bounds(&self) -> (u64, u64) {
        (self.base, self.end())
    }

    fn read_byte(&mut self) -> Result<u8> {
        Ok(self.take::<1>()?[0])
    }

    fn read_int(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take::<4>()?))
    }

    fn read_long(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take::<8>()?))
    }

    fn section_start(&self, name: &str) -> Result<u64> {
        self.sections.start_of(name)
    }

    fn section_end(&self, name: &str) -> Result<u64> {
        self.sections.end_of(name)
    }
}
