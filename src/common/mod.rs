//! Common types and utilities shared across formats.
//!
//! This module provides the error taxonomy, binary readers, text decoding
//! helpers and format detection used by every stage of the pipeline.

// Submodule declarations
pub mod binary;
pub mod detection;
pub mod encoding;
pub mod error;

// Re-exports for convenience
pub use detection::{DocumentKind, FileSignatureInfo};
pub use error::{Error, ErrorCode, Result};
