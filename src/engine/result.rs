use std::path::{Path, PathBuf};

use serde::Serialize;

use super::context::Stage;
use super::metrics::MetricsSnapshot;
use crate::analysis::{DocumentAnalysis, DocumentMetadata, DocumentStructure, ObjectCounts};
use crate::common::detection::{ContainerFlavor, DocumentKind, FileSignatureInfo};
use crate::common::error::{Error, ErrorCode};
use crate::extract::{ExtractionResult, StrategyStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub name: Option<String>,
    pub extension: Option<String>,
    /// Size from stat, 0 when the file could not be examined
    pub size: u64,
}

impl FileInfo {
    pub fn new(path: &Path, size: u64) -> Self {
        Self {
            path: path.to_path_buf(),
            name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase()),
            size,
        }
    }
}

/// What the header window revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderInfo {
    pub kind: DocumentKind,
    pub flavor: Option<ContainerFlavor>,
    /// Leading bytes in hex
    pub signature: String,
    pub version: Option<String>,
    pub compressed: bool,
    pub encrypted: bool,
    /// Raw flag word
    pub flags: u32,
}

impl From<&FileSignatureInfo> for HeaderInfo {
    fn from(info: &FileSignatureInfo) -> Self {
        Self {
            kind: info.kind,
            flavor: info.flavor,
            signature: info.signature_hex(),
            version: info.version.map(|v| v.to_string()),
            compressed: info.compressed(),
            encrypted: info.encrypted(),
            flags: info.flags.bits(),
        }
    }
}

/// Diagnostics block of an [`AnalysisResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub operation_id: String,
    /// Strategy that produced `content`, empty on failure
    pub method: String,
    pub confidence: f64,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
    /// Highest resident set size sampled during the analysis, in bytes
    pub memory_peak: u64,
    pub stage: Option<Stage>,
}

/// Everything the engine learned about one file.
///
/// Failures are reported through `success`, `error_code` and `error`
/// rather than as errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub error_code: Option<ErrorCode>,
    pub error: Option<String>,
    pub file: FileInfo,
    pub header: Option<HeaderInfo>,
    pub content: String,
    pub structure: DocumentStructure,
    pub metadata: DocumentMetadata,
    pub objects: ObjectCounts,
    pub analysis: Diagnostics,
}

impl AnalysisResult {
    pub(crate) fn completed(
        file: FileInfo,
        header: HeaderInfo,
        extraction: ExtractionResult,
        document: DocumentAnalysis,
        mut diagnostics: Diagnostics,
    ) -> Self {
        diagnostics.method = extraction.method;
        diagnostics.confidence = extraction.confidence;
        diagnostics.warnings.extend(extraction.warnings);
        diagnostics.warnings.extend(document.warnings);

        Self {
            success: true,
            error_code: None,
            error: None,
            file,
            header: Some(header),
            content: extraction.text,
            structure: document.structure,
            metadata: document.metadata,
            objects: document.objects,
            analysis: diagnostics,
        }
    }

    pub(crate) fn failed(file: FileInfo, error: &Error, diagnostics: Diagnostics) -> Self {
        Self {
            success: false,
            error_code: Some(error.code()),
            error: Some(error.to_string()),
            file,
            header: None,
            content: String::new(),
            structure: DocumentStructure::default(),
            metadata: DocumentMetadata::default(),
            objects: ObjectCounts::default(),
            analysis: Diagnostics {
                confidence: 0.0,
                ..diagnostics
            },
        }
    }
}

/// Header-only report from [`crate::Engine::quick_preview`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewResult {
    pub file: FileInfo,
    pub header: HeaderInfo,
}

/// Reported to the batch callback after each file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub path: PathBuf,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStatus {
    /// Current resident set size, when it can be read
    pub resident: Option<u64>,
    pub ceiling: u64,
    /// Resident size at or above the warning ratio of the ceiling
    pub pressure: bool,
}

/// Output of [`crate::Engine::health_check`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub strategies: Vec<StrategyStatus>,
    pub in_flight: usize,
    pub capacity: usize,
    pub memory: MemoryStatus,
    pub metrics: MetricsSnapshot,
    pub warnings: Vec<String>,
}
