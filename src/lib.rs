//! hwpscan - resource-bounded analysis of untrusted office documents
//!
//! This library extracts text, structure and metadata from legacy HWP
//! record streams, OLE2 compound files (HWP 5 and legacy Office) and ZIP
//! based packages (HWPX, slide decks). Inputs are treated as hostile: every
//! read is bounded in size, memory and time, and damaged files degrade to
//! lower-confidence results instead of errors.
//!
//! # Features
//!
//! - **Secure ingestion**: access, size and signature checks before any body read
//! - **Format detection**: OLE, ZIP and proprietary record streams from fixed-offset signatures
//! - **Strategy chain**: external tools, container streams and record scanning, each with
//!   its own timeout and a confidence in `[0, 1]`
//! - **Metadata and structure**: property sets, package XML and text heuristics
//! - **Bounded concurrency**: a FIFO gate, per-analysis memory sampling and running metrics
//!
//! # Example
//!
//! ```no_run
//! use hwpscan::{AnalyzeOptions, Engine, EngineConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(EngineConfig::default());
//!
//! // Header only
//! let preview = engine.quick_preview("document.hwp").await?;
//! println!("{:?} {:?}", preview.header.kind, preview.header.version);
//!
//! // Full analysis; failures are reported in the result
//! let result = engine.analyze("document.hwp", &AnalyzeOptions::default()).await;
//! println!("{} via {}", result.content, result.analysis.method);
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Low-level OLE access
//!
//! ```no_run
//! use std::fs::File;
//! use hwpscan::ole::OleFile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut ole = OleFile::open(File::open("document.hwp")?)?;
//! for stream in ole.stream_infos() {
//!     println!("{} ({} bytes)", stream.path.join("/"), stream.size);
//! }
//! let header = ole.open_stream(&["FileHeader"])?;
//! println!("FileHeader: {} bytes", header.len());
//! # Ok(())
//! # }
//! ```

/// Error taxonomy, binary readers, text encodings and format detection
pub mod common;

/// OLE2 compound-file reader and property-set parsing
pub mod ole;

pub mod analysis;
pub mod config;
pub mod container;
pub mod decompress;
pub mod engine;
pub mod extract;
pub mod ingest;
pub mod records;

// Re-export commonly used types for convenience
pub use common::{DocumentKind, Error, ErrorCode, FileSignatureInfo, Result};
pub use config::{AnalyzeOptions, EngineConfig};
pub use engine::{
    AnalysisResult, BatchProgress, Engine, EngineBuilder, HealthReport, MetricsSnapshot,
    PreviewResult, Stage,
};
pub use extract::{ExtractionResult, ExtractionStrategy, StrategyInput, StrategyOutput};
