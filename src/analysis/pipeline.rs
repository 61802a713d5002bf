//! Sequential pass orchestration with per-pass failure isolation.
//!
//! A `Pipeline` owns the passes, the shared model and the shared reader of
//! one run. `run()` executes the passes in declared order, folding each
//! pass's result into a `PassOutcome`; a failing (or, optionally,
//! panicking) pass is recorded as a `PassFailure` and the next pass runs
//! regardless. The run always ends `Completed` and hands the model to the
//! caller.

use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::analysis::Analyzer;
use crate::config::PipelineConfig;
use crate::error::AnalysisError;
use crate::io::SharedReader;
use crate::model::{AnalysisInfo, SharedAnalysisInfo};

/// Lifecycle of a pipeline run.
///
/// `run` consumes the pipeline, so callers see `Idle` before a run and
/// `Completed` in the returned `AnalysisRun`. `Running` is held only while
/// passes execute and is not observable from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PassStatus {
    Succeeded,
    Failed,
}

/// Per-pass record of a run, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassOutcome {
    pub index: usize,
    pub pass: String,
    pub status: PassStatus,
    pub elapsed: Duration,
}

/// A pass's failure, tagged with the pass that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pass '{pass}' (#{index}) failed: {error}")]
pub struct PassFailure {
    pub index: usize,
    pub pass: String,
    pub error: AnalysisError,
}

/// Result of a completed run. The model is owned by the caller from here on.
#[derive(Debug)]
pub struct AnalysisRun {
    pub info: AnalysisInfo,
    pub outcomes: Vec<PassOutcome>,
    pub failures: Vec<PassFailure>,
    pub state: PipelineState,
}

impl AnalysisRun {
    /// Whether every pass succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure recorded for the named pass, if any.
    pub fn failure_of(&self, pass: &str) -> Option<&PassFailure> {
        self.failures.iter().find(|f| f.pass == pass)
    }
}

/// Ordered passes sharing one model and one reader.
pub struct Pipeline {
    info: SharedAnalysisInfo,
    reader: SharedReader,
    passes: Vec<Box<dyn Analyzer>>,
    config: PipelineConfig,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(info: SharedAnalysisInfo, reader: SharedReader, config: PipelineConfig) -> Self {
        Self {
            info,
            reader,
            passes: Vec::new(),
            config,
            state: PipelineState::Idle,
        }
    }

    /// Handle to the model, for constructing passes.
    pub fn info(&self) -> SharedAnalysisInfo {
        Rc::clone(&self.info)
    }

    /// Handle to the reader, for constructing passes.
    pub fn reader(&self) -> SharedReader {
        Rc::clone(&self.reader)
    }

    /// Append a pass; passes run in the order they are added.
    pub fn push<A: Analyzer + 'static>(&mut self, pass: A) {
        self.passes.push(Box::new(pass));
    }

    pub fn with_pass<A: Analyzer + 'static>(mut self, pass: A) -> Self {
        self.push(pass);
        self
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Execute every pass once, in order.
    pub fn run(mut self) -> AnalysisRun {
        let span = info_span!("pipeline", passes = self.passes.len());
        let _g = span.enter();

        let mut outcomes = Vec::with_capacity(self.passes.len());
        let mut failures = Vec::new();

        if self.passes.is_empty() {
            debug!("no passes configured");
        } else {
            self.state = PipelineState::Running;
            let slow = Duration::from_millis(self.config.slow_pass_warn_ms);
            for (index, pass) in self.passes.iter_mut().enumerate() {
                let name = pass.name().to_string();
                let pass_span = info_span!("pass", name = %name, index);
                let _pg = pass_span.enter();

                debug!("starting pass");
                let started = Instant::now();
                let result = run_pass(pass.as_mut(), self.config.catch_panics);
                let elapsed = started.elapsed();

                if elapsed > slow {
                    warn!(elapsed_ms = elapsed.as_millis() as u64, "slow pass");
                }

                let status = match result {
                    Ok(()) => {
                        debug!(elapsed_ms = elapsed.as_millis() as u64, "pass finished");
                        PassStatus::Succeeded
                    }
                    Err(error) => {
                        warn!(error = %error, "pass failed; continuing");
                        failures.push(PassFailure {
                            index,
                            pass: name.clone(),
                            error,
                        });
                        PassStatus::Failed
                    }
                };
                outcomes.push(PassOutcome {
                    index,
                    pass: name,
                    status,
                    elapsed,
                });
            }
        }
        self.state = PipelineState::Completed;

        // Passes hold clones of the model handle; release them first.
        self.passes.clear();
        let info = into_model(self.info);
        let counts = info.counts();
        info!(
            failed = failures.len(),
            cfstrings = counts.cfstrings,
            selectors = counts.selectors,
            classes = counts.classes,
            methods = counts.methods,
            references = counts.references,
            "pipeline completed"
        );

        AnalysisRun {
            info,
            outcomes,
            failures,
            state: self.state,
        }
    }
}

fn run_pass(pass: &mut dyn Analyzer, catch_panics: bool) -> Result<(), AnalysisError> {
    if !catch_panics {
        return pass.run();
    }
    panic::catch_unwind(AssertUnwindSafe(|| pass.run()))
        .unwrap_or_else(|payload| Err(AnalysisError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Take the model out of its shared handle, cloning only if someone else
/// still holds a handle.
fn into_model(info: SharedAnalysisInfo) -> AnalysisInfo {
    match Rc::try_unwrap(info) {
        Ok(cell) => cell.into_inner(),
        Err(shared) => shared.borrow().clone(),
    }
}
