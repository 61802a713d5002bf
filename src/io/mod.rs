//! Backend-independent, cursor-based access to binary images.
//!
//! Analysis passes read the image exclusively through the `BinaryReader`
//! trait. Backends implement the primitive operations (seek plus the three
//! fixed-width reads and the section queries); every "read at offset"
//! helper is composed from `seek` followed by the bare read, so it leaves
//! the cursor just past the bytes it consumed.
//!
//! All multi-byte values are little-endian. Offsets are addresses in the
//! image's address space, not file positions.

pub mod error;
pub mod image;
pub mod macho;
pub mod section;

use std::cell::RefCell;
use std::rc::Rc;

pub use crate::io::error::{ImageError, ReadError, Result};
pub use crate::io::image::ImageReader;
pub use crate::io::macho::MachOReader;
pub use crate::io::section::{Section, SectionTable};

/// A reader shared by every pass of one pipeline run.
///
/// Runs are single-threaded and sequential, so interior mutability through
/// `RefCell` is sufficient; no pass holds a borrow across another pass.
pub type SharedReader = Rc<RefCell<dyn BinaryReader>>;

/// Wrap a concrete backend for sharing across passes.
pub fn share<R: BinaryReader + 'static>(reader: R) -> SharedReader {
    Rc::new(RefCell::new(reader))
}

/// Uniform random access to a binary image with a single cursor.
pub trait BinaryReader {
    /// Move the cursor to `offset`. No bytes are accessed.
    ///
    /// Fails with `ReadError::OutOfRange` if `offset` is outside the image;
    /// the cursor is left unchanged in that case.
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Current cursor position.
    fn position(&self) -> u64;

    /// Addressable range `[start, end)` of the image.
    fn bounds(&self) -> (u64, u64);

    /// Read one byte at the cursor and advance by one.
    fn read_byte(&mut self) -> Result<u8>;

    /// Read a little-endian `u32` at the cursor and advance by four.
    fn read_int(&mut self) -> Result<u32>;

    /// Read a little-endian `u64` at the cursor and advance by eight.
    fn read_long(&mut self) -> Result<u64>;

    /// Start address of the named section.
    fn section_start(&self, name: &str) -> Result<u64>;

    /// End address (exclusive) of the named section.
    fn section_end(&self, name: &str) -> Result<u64>;

    fn read_byte_at(&mut self, offset: u64) -> Result<u8> {
        self.seek(offset)?;
        self.read_byte()
    }

    fn read_int_at(&mut self, offset: u64) -> Result<u32> {
        self.seek(offset)?;
        self.read_int()
    }

    fn read_long_at(&mut self, offset: u64) -> Result<u64> {
        self.seek(offset)?;
        self.read_long()
    }

    /// Read a pointer-sized value and strip tag/auth bits with `mask`.
    fn read_pointer_at(&mut self, offset: u64, mask: u64) -> Result<u64> {
        Ok(self.read_long_at(offset)? & mask)
    }

    /// Read `len` raw bytes starting at `offset`.
    fn read_bytes_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.seek(offset)?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.read_byte()?);
        }
        Ok(out)
    }

    /// Read a NUL-terminated string starting at `offset`.
    ///
    /// At most `max_len` bytes are consumed; longer strings are truncated.
    /// Running off the end of the image before a terminator is an error.
    fn read_c_string_at(&mut self, offset: u64, max_len: usize) -> Result<String> {
        self.seek(offset)?;
        let mut buf = Vec::new();
        while buf.len() < max_len {
            match self.read_byte()? {
                0 => break,
                b => buf.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Check that `width` bytes at `offset` lie inside `[start, end)`.
pub(crate) fn check_range(offset: u64, width: u64, start: u64, end: u64) -> Result<()> {
    let last = offset.checked_add(width);
    match last {
        Some(last) if offset >= start && last <= end && offset < end => Ok(()),
        _ => {
            tracing::trace!(offset, width, start, end, "out-of-range access");
            Err(ReadError::OutOfRange {
                offset,
                width,
                start,
                end,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader() -> ImageReader {
        let mut data = vec![0u8; 0x40];
        data[0x10..0x18].copy_from_slice(&0x8000_0001_0000_1234u64.to_le_bytes());
        data[0x20..0x26].copy_from_slice(b"alloc\0");
        ImageReader::new(0x1000, data)
    }

    #[test]
    fn check_range_bounds() {
        assert!(check_range(0x1000, 4, 0x1000, 0x1100).is_ok());
        assert!(check_range(0x10fc, 4, 0x1000, 0x1100).is_ok());
        assert!(check_range(0x10fe, 4, 0x1000, 0x1100).is_err());
        assert!(check_range(0x0fff, 1, 0x1000, 0x1100).is_err());
        assert!(check_range(u64::MAX, 8, 0, u64::MAX).is_err());
    }

    #[test]
    fn pointer_is_masked() {
        let mut r = reader();
        let p = r.read_pointer_at(0x1010, 0x0000_000f_ffff_ffff).unwrap();
        assert_eq!(p, 0x1_0000_1234);
        assert_eq!(r.position(), 0x1018);
    }

    #[test]
    fn c_string_reads_to_terminator() {
        let mut r = reader();
        assert_eq!(r.read_c_string_at(0x1020, 64).unwrap(), "alloc");
        assert_eq!(r.position(), 0x1026);
        assert_eq!(r.read_c_string_at(0x1020, 3).unwrap(), "all");
    }

    #[test]
    fn c_string_without_terminator_fails() {
        let mut r = ImageReader::new(0x1000, b"abc".to_vec());
        assert!(matches!(
            r.read_c_string_at(0x1000, 16),
            Err(ReadError::OutOfRange { .. })
        ));
    }

    #[test]
    fn read_bytes_at_composes_reads() {
        let mut r = reader();
        assert_eq!(r.read_bytes_at(0x1020, 3).unwrap(), b"all");
        assert_eq!(r.position(), 0x1023);
    }

    #[test]
    fn shared_reader_is_usable_through_trait_object() {
        let shared = share(reader());
        let b = shared.borrow_mut().read_byte_at(0x1020).unwrap();
        assert_eq!(b, b'a');
        assert_eq!(shared.borrow().bounds(), (0x1000, 0x1040));
    }
}
