//! Objective-C runtime metadata passes.
//!
//! Each pass walks one runtime table through the shared reader and commits
//! what it finds to the shared model. Passes skip quietly when their
//! section is missing, seek before every read, and commit through the
//! model's dedupe-by-address API so that running them again adds nothing.

pub mod cfstring;
pub mod class;
pub mod resolver;
pub mod selector;

pub use crate::analyzers::cfstring::CfStringAnalyzer;
pub use crate::analyzers::class::{ClassAnalyzer, MethodListFlags};
pub use crate::analyzers::resolver::ReferenceResolver;
pub use crate::analyzers::selector::SelectorAnalyzer;

use tracing::debug;

use crate::analysis::Pipeline;
use crate::config::AnalysisConfig;
use crate::io::{BinaryReader, SharedReader};
use crate::model::AnalysisInfo;

/// Build the standard pass order over `reader`:
/// cfstrings, selectors, classes, then reference resolution.
pub fn default_pipeline(reader: SharedReader, config: &AnalysisConfig) -> Pipeline {
    let pipeline = Pipeline::new(AnalysisInfo::shared(), reader, config.pipeline.clone());
    let (info, reader) = (pipeline.info(), pipeline.reader());
    pipeline
        .with_pass(CfStringAnalyzer::new(
            info.clone(),
            reader.clone(),
            config.objc.clone(),
        ))
        .with_pass(SelectorAnalyzer::new(
            info.clone(),
            reader.clone(),
            config.objc.clone(),
        ))
        .with_pass(ClassAnalyzer::new(
            info.clone(),
            reader,
            config.objc.clone(),
        ))
        .with_pass(ReferenceResolver::new(info))
}

/// Range of the named section, or `None` (logged) when the image lacks it.
pub(crate) fn section_bounds(reader: &dyn BinaryReader, name: &str) -> Option<(u64, u64)> {
    match (reader.section_start(name), reader.section_end(name)) {
        (Ok(start), Ok(end)) => Some((start, end)),
        _ => {
            debug!(section = name, "section not present; skipping");
            None
        }
    }
}

/// Addresses of consecutive `stride`-byte slots that fit in `[start, end)`.
pub(crate) fn slots(start: u64, end: u64, stride: u64) -> impl Iterator<Item = u64> {
    let count = end.saturating_sub(start) / stride;
    (0..count).map(move |i| start + i * stride)
}
