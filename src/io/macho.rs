//! File-backed reader for Mach-O (and other `object`-supported) images.
//!
//! The file is memory-mapped and parsed once with the `object` crate to
//! collect its sections and the file-backed ranges of its segments.
//! Reads are addressed by virtual address and translated to file offsets
//! through those segment ranges.

use memmap2::Mmap;
use object::{Object, ObjectSection, ObjectSegment};
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::IoConfig;
use crate::io::error::{ImageError, ReadError, Result};
use crate::io::section::{Section, SectionTable};
use crate::io::{check_range, BinaryReader};

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl fmt::Debug for Backing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Backing::Mapped(_) => "Mapped",
            Backing::Owned(_) => "Owned",
        };
        write!(f, "{}({} bytes)", kind, self.as_slice().len())
    }
}

impl Backing {
    fn as_slice(&self) -> &[u8] {
        match self {
            Backing::Mapped(m) => &m[..],
            Backing::Owned(v) => v.as_slice(),
        }
    }
}

/// Virtual range backed by file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MappedRange {
    address: u64,
    size: u64,
    file_offset: u64,
}

impl MappedRange {
    fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }

    fn contains(&self, addr: u64, width: u64) -> bool {
        addr >= self.address && addr.saturating_add(width) <= self.end()
    }
}

/// Reader over a parsed object file, addressed by virtual address.
#[derive(Debug)]
pub struct MachOReader {
    backing: Backing,
    ranges: Vec<MappedRange>,
    sections: SectionTable,
    bounds: (u64, u64),
    cursor: u64,
}

impl MachOReader {
    /// Memory-map and parse the file at `path`.
    ///
    /// Fails if the file exceeds `config.max_file_size`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        config: &IoConfig,
    ) -> std::result::Result<Self, ImageError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        debug!(
            path = %path.display(),
            size = file_size,
            max_file_size = config.max_file_size,
            "opening image for analysis"
        );

        if file_size > config.max_file_size {
            warn!(
                path = %path.display(),
                size = file_size,
                limit = config.max_file_size,
                "File is too large"
            );
            return Err(ImageError::FileTooLarge {
                limit: config.max_file_size,
                found: file_size,
            });
        }
        if file_size == 0 {
            return Err(ImageError::Parse("file is empty".to_string()));
        }

        // Safety: read-only map of a regular file that we do not modify.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_backing(Backing::Mapped(mmap))
    }

    /// Parse an image already held in memory.
    pub fn from_bytes(data: Vec<u8>) -> std::result::Result<Self, ImageError> {
        Self::from_backing(Backing::Owned(data))
    }

    fn from_backing(backing: Backing) -> std::result::Result<Self, ImageError> {
        let (ranges, sections) = {
            let obj = object::File::parse(backing.as_slice())
                .map_err(|e| ImageError::Parse(e.to_string()))?;
            (
                collect_ranges(&obj, backing.as_slice().len() as u64),
                collect_sections(&obj)?,
            )
        };

        let start = ranges.iter().map(|r| r.address).min().unwrap_or(0);
        let end = ranges.iter().map(MappedRange::end).max().unwrap_or(0);
        debug!(
            segments = ranges.len(),
            sections = sections.len(),
            start,
            end,
            "parsed image layout"
        );

        Ok(Self {
            backing,
            ranges,
            sections,
            bounds: (start, end),
            cursor: start,
        })
    }

    pub fn sections(&self) -> &SectionTable {
        &self.sections
    }

    fn range_for(&self, addr: u64, width: u64) -> Result<&MappedRange> {
        let (start, end) = self.bounds;
        check_range(addr, width, start, end)?;
        self.ranges
            .iter()
            .find(|r| r.contains(addr, width))
            .ok_or(ReadError::OutOfRange {
                offset: addr,
                width,
                start,
                end,
            })
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let range = *self.range_for(self.cursor, N as u64)?;
        let out_of_range = ReadError::OutOfRange {
            offset: self.cursor,
            width: N as u64,
            start: self.bounds.0,
            end: self.bounds.1,
        };
        let bytes = range
            .file_offset
            .checked_add(self.cursor - range.address)
            .and_then(|at| usize::try_from(at).ok())
            .and_then(|at| Some(at..at.checked_add(N)?))
            .and_then(|span| self.backing.as_slice().get(span))
            .ok_or(out_of_range)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(bytes);
        self.cursor += N as u64;
        Ok(buf)
    }
}

/// File-backed segment ranges. Segments whose file range does not lie
/// within the `file_len` bytes of the image are dropped.
fn collect_ranges(obj: &object::File<'_>, file_len: u64) -> Vec<MappedRange> {
    let mut ranges: Vec<MappedRange> = obj
        .segments()
        .filter_map(|seg| {
            let (file_offset, file_size) = seg.file_range();
            let size = file_size.min(seg.size());
            if size == 0 {
                return None;
            }
            match file_offset.checked_add(size) {
                Some(end) if end <= file_len => Some(MappedRange {
                    address: seg.address(),
                    size,
                    file_offset,
                }),
                _ => {
                    debug!(
                        address = seg.address(),
                        file_offset,
                        size,
                        file_len,
                        "segment file range lies outside the image; ignoring"
                    );
                    None
                }
            }
        })
        .collect();
    ranges.sort_by_key(|r| r.address);
    ranges
}

fn collect_sections(obj: &object::File<'_>) -> std::result::Result<SectionTable, ImageError> {
    let mut out: Vec<Section> = Vec::new();
    for section in obj.sections() {
        if section.size() == 0 {
            continue;
        }
        let Ok(name) = section.name() else { continue };
        // Mach-O reuses section names across segments (`__const`); later
        // duplicates are qualified with their segment name.
        let name = if out.iter().any(|s| s.name == name) {
            let qualified = match section.segment_name() {
                Ok(Some(seg)) => format!("{},{}", seg, name),
                _ => {
                    debug!(section = name, "duplicate section without segment name; ignoring");
                    continue;
                }
            };
            if out.iter().any(|s| s.name == qualified) {
                debug!(section = %qualified, "duplicate qualified section name; ignoring");
                continue;
            }
            qualified
        } else {
            name.to_string()
        };
        let start = section.address();
        out.push(Section::new(name, start, start.saturating_add(section.size())));
    }
    SectionTable::new(out)
}

impl BinaryReader for MachOReader {
    fn seek(&mut self, offset: u64) -> Result<()> {
        self.range_for(offset, 1)?;
        self.cursor = offset;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.cursor
    }

    fn bounds(&self) -> (u64, u64) {
        self.bounds
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
