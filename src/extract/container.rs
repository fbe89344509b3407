use std::sync::Arc;

use async_trait::async_trait;

use super::types::{ExtractionStrategy, StrategyInput, StrategyOutput};
use crate::common::detection::DocumentKind;
use crate::common::error::{Error, Result};
use crate::container::{self, ContainerDocument, TextSource};
use crate::decompress::Decompressor;

const BODY_CONFIDENCE: f64 = 0.85;
const PREVIEW_CONFIDENCE: f64 = 0.6;

/// Text from container streams: section bodies first, then the preview.
#[derive(Debug)]
pub struct ContainerStrategy {
    decompressor: Arc<Decompressor>,
}

impl ContainerStrategy {
    pub const NAME: &'static str = "container";

    pub fn new(decompressor: Arc<Decompressor>) -> Self {
        Self { decompressor }
    }

    async fn document(&self, input: &StrategyInput) -> Result<(Arc<ContainerDocument>, bool)> {
        if let Some(doc) = &input.container {
            return Ok((doc.clone(), false));
        }
        let flavor = input
            .signature
            .flavor
            .ok_or_else(|| Error::strategy(Self::NAME, "no container flavor"))?;
        let data = input.data.clone();
        let decompressor = self.decompressor.clone();
        let doc = tokio::task::spawn_blocking(move || container::parse(&data, flavor, &decompressor))
            .await
            .map_err(|e| Error::strategy(Self::NAME, e))??;
        Ok((Arc::new(doc), true))
    }
}

#[async_trait]
impl ExtractionStrategy for ContainerStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn extract(&self, input: &StrategyInput) -> Result<StrategyOutput> {
        if input.signature.kind != DocumentKind::Container {
            return Err(Error::strategy(Self::NAME, "input is not a container"));
        }
        let (doc, parsed_here) = self.document(input).await?;

        let (text, source) = doc
            .text()
            .ok_or_else(|| Error::strategy(Self::NAME, "no body or preview text"))?;

        let mut output = StrategyOutput::new(text);
        if parsed_here {
            output.warnings.extend(doc.warnings.iter().cloned());
        }
        output = match source {
            TextSource::Body => output.with_confidence(BODY_CONFIDENCE),
            TextSource::Preview => output
                .with_confidence(PREVIEW_CONFIDENCE)
                .with_warning("body text unavailable; using preview text"),
        };
        Ok(output)
    }
}
