//! Reconstruction of Objective-C runtime metadata from compiled images.
//!
//! The crate has two layers:
//!
//! - `io`: the `BinaryReader` contract, a cursor-based little-endian reader
//!   with section queries, plus in-memory and object-file backends;
//! - `analysis`: the `Analyzer` pass contract and the `Pipeline` that runs
//!   passes in order over a shared reader and a shared `AnalysisInfo`,
//!   recording per-pass failures instead of aborting.
//!
//! `analyzers` contains the Objective-C passes built on those contracts.
//!
//! ```no_run
//! use objrecon::{analyzers, io, AnalysisConfig};
//!
//! let config = AnalysisConfig::default();
//! let reader = io::MachOReader::open("Foundation", &config.io).unwrap();
//! let run = analyzers::default_pipeline(io::share(reader), &config).run();
//! for failure in &run.failures {
//!     eprintln!("{}", failure);
//! }
//! println!("{} classes", run.info.counts().classes);
//! ```

pub mod analysis;
pub mod analyzers;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod model;

pub use crate::analysis::{AnalysisRun, Analyzer, PassFailure, Pipeline, PipelineState};
pub use crate::config::AnalysisConfig;
pub use crate::error::{AnalysisError, Result};
pub use crate::io::{BinaryReader, ReadError, SharedReader};
pub use crate::model::{AnalysisInfo, SharedAnalysisInfo};
