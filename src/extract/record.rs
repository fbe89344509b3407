use std::sync::Arc;

use async_trait::async_trait;

use super::types::{ExtractionStrategy, StrategyInput, StrategyOutput};
use crate::common::detection::{DocumentKind, FILE_HEADER_LEN};
use crate::common::error::{Error, Result};
use crate::decompress::Decompressor;
use crate::records::{RecordScanner, ScanMethod};

/// Binary analysis of the raw record stream.
///
/// For proprietary files the 256-byte header is skipped and the body is
/// decompressed first when the header says so. Any other input is scanned
/// as is.
#[derive(Debug)]
pub struct RecordStrategy {
    decompressor: Arc<Decompressor>,
    scanner: RecordScanner,
}

impl RecordStrategy {
    pub const NAME: &'static str = "record-scan";

    pub fn new(decompressor: Arc<Decompressor>) -> Self {
        Self {
            decompressor,
            scanner: RecordScanner::default(),
        }
    }

    pub fn with_scanner(mut self, scanner: RecordScanner) -> Self {
        self.scanner = scanner;
        self
    }
}

#[async_trait]
impl ExtractionStrategy for RecordStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn extract(&self, input: &StrategyInput) -> Result<StrategyOutput> {
        let proprietary = input.signature.kind == DocumentKind::Proprietary;
        if proprietary && input.signature.encrypted() {
            return Err(Error::strategy(Self::NAME, "record stream is encrypted"));
        }
        let compressed = proprietary && input.signature.compressed();
        let data = input.data.clone();
        let decompressor = self.decompressor.clone();
        let scanner = self.scanner;

        let (report, warning) = tokio::task::spawn_blocking(move || {
            let body = if proprietary {
                &data[FILE_HEADER_LEN.min(data.len())..]
            } else {
                &data[..]
            };
            let decoded = decompressor.decompress(body, compressed);
            (scanner.scan(&decoded.data), decoded.warning)
        })
        .await
        .map_err(|e| Error::strategy(Self::NAME, e))?;

        if report.text.trim().is_empty() {
            return Err(Error::strategy(
                Self::NAME,
                format!(
                    "no text recovered ({} records, {} bytes skipped)",
                    report.records, report.skipped_bytes
                ),
            ));
        }

        let mut output = StrategyOutput::new(report.text.clone()).with_confidence(report.confidence());
        output.warnings.extend(warning);
        if report.method == ScanMethod::Heuristic {
            output = output.with_warning(format!(
                "no record tokens found; text recovered heuristically from {} windows",
                report.windows.len()
            ));
        }
        Ok(output)
    }
}
