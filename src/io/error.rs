//! Error types for binary readers.

use thiserror::Error;

/// Failure conditions raised by a `BinaryReader` during analysis.
///
/// Backends surface their own failure modes (for example a short file
/// behind a mapped segment) through `OutOfRange` as well.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("access of {width} byte(s) at {offset:#x} outside image range [{start:#x}, {end:#x})")]
    OutOfRange {
        offset: u64,
        width: u64,
        start: u64,
        end: u64,
    },

    #[error("unknown section '{0}'")]
    UnknownSection(String),
}

/// Failures that can occur while constructing a reader backend.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("File size of {found} bytes exceeds the maximum allowed size of {limit} bytes.")]
    FileTooLarge { limit: u64, found: u64 },

    #[error("failed to parse object file: {0}")]
    Parse(String),

    #[error("invalid section table: {0}")]
    InvalidSectionTable(String),

    #[error("An underlying I/O error occurred.")]
    StdIo(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_display() {
        let err = ReadError::OutOfRange {
            offset: 0x10fe,
            width: 4,
            start: 0x1000,
            end: 0x1100,
        };
        assert_eq!(
            err.to_string(),
            "access of 4 byte(s) at 0x10fe outside image range [0x1000, 0x1100)"
        );
    }

    #[test]
    fn image_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ImageError = io.into();
        assert!(matches!(err, ImageError::StdIo(_)));
    }
}
