//! Container parsing for OLE compound files and ZIP packages.
//!
//! A container is parsed once into a [`ContainerDocument`]: the entry list,
//! body and preview text, object counts, and the raw bytes of any metadata
//! parts. Missing entries are never errors. Each absent candidate is
//! skipped, and a container with none of the expected entries yields an
//! empty document.

pub mod hwp5;
mod ole;
#[cfg(feature = "ooxml")]
mod package;

#[cfg(feature = "ooxml")]
pub(crate) use package::resolve_entity;

use bytes::Bytes;
use serde::Serialize;

use crate::common::detection::{ContainerFlavor, FormatVersion, HeaderFlags};
use crate::common::error::Result;
use crate::decompress::Decompressor;

/// A named stream or archive entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerEntry {
    /// Path with `/` separating storages
    pub name: String,
    /// Offset of the first byte in the file, 0 when unknown
    pub offset: u64,
    pub length: u64,
}

/// Embedded object counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ObjectCounts {
    pub images: usize,
    pub tables: usize,
    pub charts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSourceKind {
    /// OLE property set stream
    PropertySet,
    /// `docProps/core.xml`
    CoreXml,
    /// HWPX `Contents/content.hpf`
    PackageXml,
}

/// Undecoded bytes of a metadata part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSource {
    pub name: String,
    pub kind: MetadataSourceKind,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    Body,
    Preview,
}

/// Everything read from one container.
#[derive(Debug, Clone)]
pub struct ContainerDocument {
    pub flavor: ContainerFlavor,
    pub entries: Vec<ContainerEntry>,
    pub body_text: String,
    pub preview_text: String,
    /// Body sections, or slides for slide decks
    pub sections: usize,
    pub objects: ObjectCounts,
    /// Version from the embedded file header, when present
    pub version: Option<FormatVersion>,
    pub flags: HeaderFlags,
    pub metadata_sources: Vec<MetadataSource>,
    pub warnings: Vec<String>,
}

impl ContainerDocument {
    fn new(flavor: ContainerFlavor, entries: Vec<ContainerEntry>) -> Self {
        Self {
            flavor,
            entries,
            body_text: String::new(),
            preview_text: String::new(),
            sections: 0,
            objects: ObjectCounts::default(),
            version: None,
            flags: HeaderFlags::empty(),
            metadata_sources: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Body text if any, else preview text.
    pub fn text(&self) -> Option<(&str, TextSource)> {
        if !self.body_text.trim().is_empty() {
            Some((&self.body_text, TextSource::Body))
        } else if !self.preview_text.trim().is_empty() {
            Some((&self.preview_text, TextSource::Preview))
        } else {
            None
        }
    }

    pub fn entry(&self, name: &str) -> Option<&ContainerEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }
}

/// Parse a container of the given flavor.
///
/// Fails only when the container structure itself cannot be opened.
pub fn parse(
    data: &Bytes,
    flavor: ContainerFlavor,
    decompressor: &Decompressor,
) -> Result<ContainerDocument> {
    match flavor {
        ContainerFlavor::Ole => ole::parse_ole(data, decompressor),
        #[cfg(feature = "ooxml")]
        ContainerFlavor::Zip => package::parse_zip(data, decompressor),
        #[cfg(not(feature = "ooxml"))]
        ContainerFlavor::Zip => Err(crate::common::error::FormatError::CorruptContainer(
            "ZIP containers require the `ooxml` feature".to_string(),
        )
        .into()),
    }
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "bmp", "emf", "gif", "jpeg", "jpg", "png", "svg", "tif", "tiff", "wmf",
];

fn is_image_name(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// Trailing number of names like `Section3` or `slide12.xml`.
fn numbered(name: &str, prefix: &str, suffix: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    lower
        .strip_prefix(&prefix.to_ascii_lowercase())?
        .strip_suffix(suffix)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_names() {
        assert_eq!(numbered("Section0", "Section", ""), Some(0));
        assert_eq!(numbered("section12.xml", "Section", ".xml"), Some(12));
        assert_eq!(numbered("slide3.xml", "slide", ".xml"), Some(3));
        assert_eq!(numbered("slideLayout1.xml", "slide", ".xml"), None);
    }

    #[test]
    fn test_image_names() {
        assert!(is_image_name("BIN0001.JPG"));
        assert!(is_image_name("media/image1.png"));
        assert!(!is_image_name("BIN0002.OLE"));
        assert!(!is_image_name("noext"));
    }

    #[test]
    fn test_text_prefers_body() {
        let mut doc = ContainerDocument::new(ContainerFlavor::Ole, Vec::new());
        assert!(doc.text().is_none());
        doc.preview_text = "preview".into();
        assert_eq!(doc.text(), Some(("preview", TextSource::Preview)));
        doc.body_text = "body".into();
        assert_eq!(doc.text(), Some(("body", TextSource::Body)));
    }
}
