//! Unified error types for hwpscan.
//!
//! This module provides the error taxonomy shared by every stage of the
//! analysis pipeline together with the stable codes reported to callers.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, ErrorCode, FormatError, ResourceLimit, Result, SecurityViolation};
