//! Metadata and structure analysis over an extracted document.
//!
//! Neither stage can fail an analysis. Whatever cannot be derived stays at
//! its default and is reported as a warning.

mod metadata;
mod structure;

pub use metadata::{DocumentMetadata, MetadataExtractor, filetime_to_datetime};
pub use structure::{DocumentStructure, StructureAnalyzer};

pub use crate::container::ObjectCounts;

use serde::Serialize;

use crate::container::ContainerDocument;

/// Output of the finalizing stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentAnalysis {
    pub metadata: DocumentMetadata,
    pub structure: DocumentStructure,
    pub objects: ObjectCounts,
    pub warnings: Vec<String>,
}

/// Derive metadata, structure and object counts.
///
/// `text` is the retained extraction text. Container level facts are used
/// when a container was parsed.
pub fn analyze(text: &str, container: Option<&ContainerDocument>) -> DocumentAnalysis {
    let (metadata, warnings) = match container {
        Some(doc) => MetadataExtractor.extract(&doc.metadata_sources),
        None => (DocumentMetadata::default(), Vec::new()),
    };
    let sections = container.map_or(0, |doc| doc.sections);
    let structure = StructureAnalyzer.analyze(text, metadata.pages, sections);
    let objects = container.map(|doc| doc.objects).unwrap_or_default();

    DocumentAnalysis {
        metadata,
        structure,
        objects,
        warnings,
    }
}
