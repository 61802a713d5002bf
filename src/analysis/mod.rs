//! Analysis passes and their orchestration.
//!
//! An `Analyzer` is one named unit of work. It is constructed with handles
//! to the shared `AnalysisInfo` and `BinaryReader` and exposes a single
//! `run()`; everything it finds is committed to the model. The `Pipeline`
//! runs passes strictly in the order they were added and records, rather
//! than propagates, the failure of any one pass.

pub mod pipeline;

pub use crate::analysis::pipeline::{
    AnalysisRun, PassFailure, PassOutcome, PassStatus, Pipeline, PipelineState,
};

use crate::error::Result;

/// One pass of the analysis pipeline.
///
/// Implementations must:
/// - seek explicitly before reading; the cursor is undefined on entry;
/// - treat data another pass would have committed as "not yet known"
///   rather than failing on its absence;
/// - be safe to run twice: a second run must not duplicate entities.
pub trait Analyzer {
    /// Name used to tag outcomes and failures.
    fn name(&self) -> &str;

    /// Perform the pass, committing results to the shared model.
    fn run(&mut self) -> Result<()>;
}

impl<A: Analyzer + ?Sized> Analyzer for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn run(&mut self) -> Result<()> {
        (**self).run()
    }
}
