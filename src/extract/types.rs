use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use crate::common::detection::FileSignatureInfo;
use crate::common::error::Result;
use crate::container::ContainerDocument;

/// Confidence assumed when a strategy does not report one.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Method name of the terminal stub result.
pub const STUB_METHOD: &str = "none";

/// What every strategy receives.
#[derive(Debug, Clone)]
pub struct StrategyInput {
    pub path: PathBuf,
    /// Whole file, shared between strategies
    pub data: Bytes,
    pub signature: FileSignatureInfo,
    /// Container parsed ahead of the chain, when the input is one
    pub container: Option<Arc<ContainerDocument>>,
}

/// Raw strategy output, before the chain validates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyOutput {
    pub text: String,
    /// Self-reported confidence; [`DEFAULT_CONFIDENCE`] when `None`
    pub confidence: Option<f64>,
    pub warnings: Vec<String>,
}

impl StrategyOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// The one extraction result retained per analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub text: String,
    /// Name of the strategy that produced `text`
    pub method: String,
    /// Always within `[0, 1]`
    pub confidence: f64,
    pub warnings: Vec<String>,
}

impl ExtractionResult {
    /// Result used when every strategy failed.
    pub fn stub(mut warnings: Vec<String>) -> Self {
        warnings.push("text extraction failed: every strategy was exhausted".to_string());
        Self {
            text: "[no text could be extracted from this document]".to_string(),
            method: STUB_METHOD.to_string(),
            confidence: 0.0,
            warnings,
        }
    }

    pub fn is_stub(&self) -> bool {
        self.method == STUB_METHOD
    }
}

/// One way of turning a document into text.
///
/// Implementations must not block the async scheduler; CPU-bound work
/// belongs in `tokio::task::spawn_blocking`.
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    /// Stable name, reported as the result method
    fn name(&self) -> &str;

    /// Whether the strategy can run at all in this environment.
    ///
    /// Called once when the strategy is registered and again only on
    /// [`crate::Engine::reset`].
    fn probe(&self) -> bool {
        true
    }

    async fn extract(&self, input: &StrategyInput) -> Result<StrategyOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_shape() {
        let stub = ExtractionResult::stub(vec!["a: timed out".into()]);
        assert_eq!(stub.method, "none");
        assert_eq!(stub.confidence, 0.0);
        assert!(!stub.text.trim().is_empty());
        assert_eq!(stub.warnings.len(), 2);
        assert!(stub.is_stub());
    }

    #[test]
    fn test_output_builder() {
        let out = StrategyOutput::new("x").with_confidence(0.9).with_warning("w");
        assert_eq!(out.confidence, Some(0.9));
        assert_eq!(out.warnings, vec!["w".to_string()]);
    }
}
