//! Error types for analysis passes.
//!
//! A pass's `run()` returns `AnalysisError`; the pipeline records it as a
//! `PassFailure` against the pass and moves on. Reader failures convert
//! into it with `?`.

use thiserror::Error;

use crate::io::ReadError;

/// Failure raised by an analysis pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// A read or section lookup failed
    #[error("read failed: {0}")]
    Read(#[from] ReadError),

    /// Metadata that does not follow the expected layout
    #[error("malformed metadata at {offset:#x}: {message}")]
    Malformed { offset: u64, message: String },

    /// The pass panicked; carries the panic payload when it was a string
    #[error("pass panicked: {0}")]
    Panicked(String),

    /// Configuration could not be loaded or was invalid
    #[error("configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn malformed(offset: u64, message: impl Into<String>) -> Self {
        AnalysisError::Malformed {
            offset,
            message: message.into(),
        }
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
