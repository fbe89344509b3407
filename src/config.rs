//! Engine configuration.
//!
//! Every field has a default so an empty YAML document is a valid
//! configuration.
//!
//! ```yaml
//! max_concurrency: 8
//! limits:
//!   max_file_size: 104857600
//!   timeout_ms: 10000
//! memory:
//!   process_ceiling: 4294967296
//! external_tools:
//!   - name: hwp5txt
//!     program: hwp5txt
//!     args: ["{path}"]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

const MIB: u64 = 1024 * 1024;

/// Per-call limits, recognized by [`crate::Engine::analyze`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzeOptions {
    /// Largest file accepted, in bytes
    pub max_file_size: u64,
    /// Largest body buffer accumulated while reading, in bytes
    pub max_memory_usage: u64,
    /// Read timeout and default per-strategy timeout
    pub timeout_ms: u64,
    /// Batch fan-out; the engine gate still applies
    pub max_concurrency: Option<usize>,
    /// Overrides `timeout_ms` for each extraction strategy
    pub strategy_timeout_ms: Option<u64>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            max_file_size: 50 * MIB,
            max_memory_usage: 256 * MIB,
            timeout_ms: 30_000,
            max_concurrency: None,
            strategy_timeout_ms: None,
        }
    }
}

impl AnalyzeOptions {
    #[inline]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[inline]
    pub fn strategy_timeout(&self) -> Duration {
        Duration::from_millis(self.strategy_timeout_ms.unwrap_or(self.timeout_ms))
    }
}

/// Background process memory sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Resident set size that aborts the running analysis
    pub process_ceiling: u64,
    pub sample_interval_ms: u64,
    /// Fraction of the ceiling reported as memory pressure by health checks
    pub warning_ratio: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            process_ceiling: 2048 * MIB,
            sample_interval_ms: 100,
            warning_ratio: 0.8,
        }
    }
}

/// Codec output bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompressionConfig {
    /// Output beyond this many bytes counts as codec failure
    pub max_output: u64,
}

impl Default for DecompressionConfig {
    fn default() -> Self {
        Self {
            max_output: 64 * MIB,
        }
    }
}

/// An external text extraction program.
///
/// `{path}` in `args` is replaced by the document path; when no argument
/// contains it, the path is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalToolConfig {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Self-reported confidence of this tool's output
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Engine-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Defaults used when a caller passes no options
    pub limits: AnalyzeOptions,
    /// Simultaneous in-flight analyses
    pub max_concurrency: usize,
    pub memory: MemoryConfig,
    pub decompression: DecompressionConfig,
    /// Primary library-backed parser, then the secondary fallback
    pub external_tools: Vec<ExternalToolConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: AnalyzeOptions::default(),
            max_concurrency: 4,
            memory: MemoryConfig::default(),
            decompression: DecompressionConfig::default(),
            external_tools: vec![
                ExternalToolConfig {
                    name: "hwp5txt".to_string(),
                    program: "hwp5txt".to_string(),
                    args: vec!["{path}".to_string()],
                    confidence: Some(0.95),
                },
                ExternalToolConfig {
                    name: "hwp5proc".to_string(),
                    program: "hwp5proc".to_string(),
                    args: vec![
                        "cat".to_string(),
                        "--vstreams".to_string(),
                        "{path}".to_string(),
                        "PrvText.utf8".to_string(),
                    ],
                    confidence: Some(0.6),
                },
            ],
        }
    }
}

impl EngineConfig {
    /// Parse a YAML configuration document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_saphyr::from_str(yaml).map_err(|e| {
            Error::unclassified("<config>", "configuration", format!("invalid YAML: {}", e))
        })?;
        config.validated()
    }

    /// Load a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| Error::unclassified(path, "configuration", e))?;
        Self::from_yaml_str(&yaml)
    }

    fn validated(mut self) -> Result<Self> {
        if self.max_concurrency == 0 {
            return Err(Error::unclassified(
                "<config>",
                "configuration",
                "max_concurrency must be at least 1",
            ));
        }
        self.memory.warning_ratio = self.memory.warning_ratio.clamp(0.0, 1.0);
        Ok(self)
    }
}
