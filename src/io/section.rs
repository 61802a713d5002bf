//! Named section ranges within an image's address space.
//!
//! A `SectionTable` is validated once at construction: ranges are
//! non-empty, non-overlapping and kept sorted by start address, so every
//! address resolves to at most one section.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::io::error::{ImageError, ReadError};

/// A named, contiguous range `[start, end)` of the image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub start: u64,
    pub end: u64,
}

impl Section {
    pub fn new(name: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    /// Size of the section in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `addr` lies inside the section.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{:#x}, {:#x})", self.name, self.start, self.end)
    }
}

/// Sorted, validated collection of sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionTable {
    sections: Vec<Section>,
}

impl SectionTable {
    /// Build a table, rejecting empty, overlapping or duplicate-named sections.
    pub fn new(mut sections: Vec<Section>) -> Result<Self, ImageError> {
        sections.sort_by_key(|s| (s.start, s.end));

        for s in &sections {
            if s.start >= s.end {
                return Err(ImageError::InvalidSectionTable(format!(
                    "section {} has an empty or inverted range",
                    s
                )));
            }
        }
        for pair in sections.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(ImageError::InvalidSectionTable(format!(
                    "section {} overlaps {}",
                    pair[1], pair[0]
                )));
            }
        }
        let mut names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(ImageError::InvalidSectionTable(format!(
                "duplicate section name '{}'",
                dup[0]
            )));
        }

        Ok(Self { sections })
    }

    pub fn get(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn start_of(&self, name: &str) -> Result<u64, ReadError> {
        self.get(name)
            .map(|s| s.start)
            .ok_or_else(|| ReadError::UnknownSection(name.to_string()))
    }

    pub fn end_of(&self, name: &str) -> Result<u64, ReadError> {
        self.get(name)
            .map(|s| s.end)
            .ok_or_else(|| ReadError::UnknownSection(name.to_string()))
    }

    /// The section containing `addr`, if any.
    pub fn containing(&self, addr: u64) -> Option<&Section> {
        let idx = self.sections.partition_point(|s| s.end <= addr);
        self.sections.get(idx).filter(|s| s.contains(addr))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
