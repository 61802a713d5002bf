//! Configuration for readers, the pass pipeline and the Objective-C passes.
//!
//! Every struct carries sensible defaults and can be loaded from (or saved
//! to) JSON; missing fields fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{AnalysisError, Result};

/// Master configuration for one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Reader backend limits.
    pub io: IoConfig,
    /// Orchestration policy.
    pub pipeline: PipelineConfig,
    /// Objective-C metadata layout parameters.
    pub objc: ObjcConfig,
}

impl AnalysisConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| AnalysisError::Config(e.to_string()))
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| AnalysisError::Config(e.to_string()))
    }
}

/// Limits applied by file-backed readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Largest file a backend will open.
    pub max_file_size: u64,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self {
            max_file_size: 512 * 1024 * 1024, // 512MB
        }
    }
}

/// Pass sequencing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Convert a panicking pass into a recorded failure instead of unwinding
    /// through the pipeline.
    pub catch_panics: bool,
    /// Passes running longer than this are logged at warn level.
    pub slow_pass_warn_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            catch_panics: true,
            slow_pass_warn_ms: 5_000,
        }
    }
}

/// Layout parameters for the Objective-C runtime passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjcConfig {
    /// Applied to every pointer read from runtime tables; strips chained
    /// fixup and pointer-authentication bits.
    pub pointer_mask: u64,
    /// Upper bound on the length of a selector or class name.
    pub max_string_len: usize,
    pub cfstring_section: String,
    pub selrefs_section: String,
    pub classlist_section: String,
}

impl Default for ObjcConfig {
    fn default() -> Self {
        Self {
            pointer_mask: 0x0000_000f_ffff_ffff,
            max_string_len: 4096,
            cfstring_section: "__cfstring".to_string(),
            selrefs_section: "__objc_selrefs".to_string(),
            classlist_section: "__objc_classlist".to_string(),
        }
    }
}
