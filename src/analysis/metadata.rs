//! Document properties from container metadata parts.
//!
//! Structured parsing comes first: OLE property sets and package XML.
//! Fields it leaves empty are then looked for with permissive patterns over
//! the raw bytes decoded under two candidate encodings, which also covers
//! damaged property streams. Nothing here fails; problems become warnings.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::common::encoding::TextEncoding;
use crate::container::{MetadataSource, MetadataSourceKind};
use crate::ole::{PropertySet, PropertyValue, parse_property_stream, pid};

/// FILETIME ticks between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_EPOCH: u64 = 116_444_736_000_000_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub category: Option<String>,
    pub comments: Option<String>,
    pub last_saved_by: Option<String>,
    pub application: Option<String>,
    pub revision: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub pages: Option<u32>,
    pub words: Option<u32>,
    pub characters: Option<u32>,
}

/// Text fields the permissive pass can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Author,
    Subject,
    Keywords,
    Category,
    Comments,
}

impl DocumentMetadata {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Author => &mut self.author,
            Field::Subject => &mut self.subject,
            Field::Keywords => &mut self.keywords,
            Field::Category => &mut self.category,
            Field::Comments => &mut self.comments,
        }
    }

    fn fill(slot: &mut Option<String>, value: Option<&str>) {
        if slot.is_none()
            && let Some(value) = value.map(str::trim).filter(|v| !v.is_empty())
        {
            *slot = Some(value.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Label or element patterns, one per field.
static FIELD_PATTERNS: Lazy<Vec<(Field, Regex)>> = Lazy::new(|| {
    let pattern = |labels: &str, tags: &str| {
        Regex::new(&format!(
            r"(?i)(?:\b(?:{labels})\s*[:=]\s*([^\r\n\x00<>]{{1,200}}))|(?:<(?:\w+:)?(?:{tags})(?:\s[^>]*)?>([^<\x00]{{1,200}})<)"
        ))
        .expect("metadata field pattern")
    };
    vec![
        (Field::Title, pattern("title|제목", "title")),
        (Field::Author, pattern("author|creator|작성자|지은이|저자", "creator|author")),
        (Field::Subject, pattern("subject|주제", "subject")),
        (Field::Keywords, pattern("keywords|키워드|핵심어", "keywords")),
        (Field::Category, pattern("category|분류|범주", "category")),
        (Field::Comments, pattern("comments|description|설명|메모", "description|comments")),
    ]
});

/// Collects [`DocumentMetadata`] from [`MetadataSource`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn extract(&self, sources: &[MetadataSource]) -> (DocumentMetadata, Vec<String>) {
        let mut metadata = DocumentMetadata::default();
        let mut warnings = Vec::new();

        for source in sources {
            match source.kind {
                MetadataSourceKind::PropertySet => match parse_property_stream(&source.data) {
                    Ok(props) => apply_property_set(&mut metadata, &source.name, &props),
                    Err(e) => {
                        warn!(source = %source.name, error = %e, "unreadable property set");
                        warnings.push(format!("{}: {}", source.name, e));
                    },
                },
                MetadataSourceKind::CoreXml | MetadataSourceKind::PackageXml => {
                    apply_xml_source(&mut metadata, source, &mut warnings)
                },
            }
        }

        for source in sources {
            permissive_pass(&mut metadata, &source.data);
        }

        (metadata, warnings)
    }
}

#[cfg(feature = "ooxml")]
fn apply_xml_source(metadata: &mut DocumentMetadata, source: &MetadataSource, warnings: &mut Vec<String>) {
    if let Err(e) = xml::apply_xml(metadata, &source.data) {
        warn!(source = %source.name, error = %e, "malformed metadata XML");
        warnings.push(format!("{}: {}", source.name, e));
    }
}

/// Without XML support only the permissive pass sees package metadata.
#[cfg(not(feature = "ooxml"))]
fn apply_xml_source(_: &mut DocumentMetadata, _: &MetadataSource, _: &mut Vec<String>) {}

fn apply_property_set(metadata: &mut DocumentMetadata, name: &str, props: &PropertySet) {
    let text = |id: u32| props.get(&id).and_then(PropertyValue::as_text);

    // DocumentSummaryInformation reuses low ids with other meanings
    if name.contains("DocumentSummary") {
        DocumentMetadata::fill(&mut metadata.category, text(pid::CATEGORY));
        return;
    }

    DocumentMetadata::fill(&mut metadata.title, text(pid::TITLE));
    DocumentMetadata::fill(&mut metadata.subject, text(pid::SUBJECT));
    DocumentMetadata::fill(&mut metadata.author, text(pid::AUTHOR));
    DocumentMetadata::fill(&mut metadata.keywords, text(pid::KEYWORDS));
    DocumentMetadata::fill(&mut metadata.comments, text(pid::COMMENTS));
    DocumentMetadata::fill(&mut metadata.last_saved_by, text(pid::LAST_SAVED_BY));
    DocumentMetadata::fill(&mut metadata.revision, text(pid::REVISION));
    DocumentMetadata::fill(&mut metadata.application, text(pid::APPLICATION));

    let time = |id: u32| match props.get(&id) {
        Some(PropertyValue::Filetime(ft)) => filetime_to_datetime(*ft),
        _ => None,
    };
    metadata.created = metadata.created.or_else(|| time(pid::CREATE_TIME));
    metadata.modified = metadata.modified.or_else(|| time(pid::LAST_SAVED_TIME));

    let number = |id: u32| props.get(&id).and_then(PropertyValue::as_u32);
    metadata.pages = metadata.pages.or_else(|| number(pid::NUM_PAGES));
    metadata.words = metadata.words.or_else(|| number(pid::NUM_WORDS));
    metadata.characters = metadata.characters.or_else(|| number(pid::NUM_CHARS));
}

/// Convert a FILETIME (100 ns ticks since 1601) to UTC; zero means unset.
pub fn filetime_to_datetime(filetime: u64) -> Option<DateTime<Utc>> {
    if filetime == 0 {
        return None;
    }
    let since_unix = filetime.checked_sub(FILETIME_UNIX_EPOCH)?;
    let secs = i64::try_from(since_unix / 10_000_000).ok()?;
    let nanos = ((since_unix % 10_000_000) * 100) as u32;
    DateTime::from_timestamp(secs, nanos)
}

fn permissive_pass(metadata: &mut DocumentMetadata, data: &[u8]) {
    let missing: Vec<&(Field, Regex)> = FIELD_PATTERNS
        .iter()
        .filter(|(field, _)| metadata.slot(*field).is_none())
        .collect();
    if missing.is_empty() {
        return;
    }

    for encoding in [TextEncoding::Utf16Le, TextEncoding::EucKr] {
        let decoded = encoding.decode(data);
        for (field, regex) in &missing {
            let slot = metadata.slot(*field);
            if slot.is_some() {
                continue;
            }
            let value = regex
                .captures(&decoded)
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| m.as_str());
            DocumentMetadata::fill(slot, value);
        }
    }
}

#[cfg(feature = "ooxml")]
mod xml {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    use super::{DocumentMetadata, Field};
    use crate::common::error::Result;
    use crate::container::resolve_entity;

    /// Apply Dublin Core / OPF metadata elements.
    ///
    /// `<opf:meta name="creator">` style elements use the `name` attribute
    /// as the key.
    pub(super) fn apply_xml(metadata: &mut DocumentMetadata, xml: &[u8]) -> Result<()> {
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::new();
        let mut key: Option<String> = None;
        let mut text = String::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    key = if local == "meta" {
                        e.attributes()
                            .flatten()
                            .find(|a| a.key.local_name().as_ref() == b"name")
                            .map(|a| String::from_utf8_lossy(&a.value).into_owned())
                    } else {
                        Some(local)
                    };
                    text.clear();
                },
                Event::Text(e) if key.is_some() => text.push_str(&String::from_utf8_lossy(&e)),
                Event::GeneralRef(e) if key.is_some() => {
                    if let Some(c) = resolve_entity(&String::from_utf8_lossy(&e)) {
                        text.push(c);
                    }
                },
                Event::End(_) => {
                    if let Some(k) = key.take() {
                        apply_key(metadata, &k, text.trim());
                    }
                    text.clear();
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }
        Ok(())
    }

    fn apply_key(metadata: &mut DocumentMetadata, key: &str, value: &str) {
        let field = match key.to_ascii_lowercase().as_str() {
            "title" => Some(Field::Title),
            "creator" | "author" => Some(Field::Author),
            "subject" => Some(Field::Subject),
            "keywords" | "keyword" => Some(Field::Keywords),
            "category" => Some(Field::Category),
            "description" | "comments" => Some(Field::Comments),
            "lastmodifiedby" | "lastsaveby" => {
                DocumentMetadata::fill(&mut metadata.last_saved_by, Some(value));
                None
            },
            "revision" => {
                DocumentMetadata::fill(&mut metadata.revision, Some(value));
                None
            },
            "created" | "createddate" => {
                metadata.created = metadata.created.or_else(|| parse_date(value));
                None
            },
            "modified" | "modifieddate" => {
                metadata.modified = metadata.modified.or_else(|| parse_date(value));
                None
            },
            _ => None,
        };
        if let Some(field) = field {
            DocumentMetadata::fill(metadata.slot(field), Some(value));
        }
    }

    fn parse_date(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&chrono::Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(kind: MetadataSourceKind, name: &str, data: Vec<u8>) -> MetadataSource {
        MetadataSource {
            name: name.to_string(),
            kind,
            data,
        }
    }

    #[test]
    fn test_filetime_conversion() {
        assert_eq!(filetime_to_datetime(0), None);
        let dt = filetime_to_datetime(FILETIME_UNIX_EPOCH + 10_000_000).unwrap();
        assert_eq!(dt.timestamp(), 1);
        assert!(filetime_to_datetime(1).is_none());
    }

    #[test]
    fn test_permissive_utf16_labels() {
        let text = "garbage\u{0}Title: 분기 보고서\r\nAuthor = 홍길동\r\n";
        let data: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let (metadata, warnings) = MetadataExtractor.extract(&[source(
            MetadataSourceKind::PropertySet,
            "SummaryInformation",
            data,
        )]);
        assert_eq!(metadata.title.as_deref(), Some("분기 보고서"));
        assert_eq!(metadata.author.as_deref(), Some("홍길동"));
        // the bytes are not a valid property set
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_permissive_euc_kr_labels() {
        let (data, _, _) = encoding_rs::EUC_KR.encode("제목: 연간 계획\n분류: 내부\n");
        let (metadata, _) = MetadataExtractor.extract(&[source(
            MetadataSourceKind::PropertySet,
            "SummaryInformation",
            data.into_owned(),
        )]);
        assert_eq!(metadata.title.as_deref(), Some("연간 계획"));
        assert_eq!(metadata.category.as_deref(), Some("내부"));
    }

    #[cfg(feature = "ooxml")]
    #[test]
    fn test_core_xml() {
        let xml = br#"<?xml version="1.0"?>
<cp:coreProperties xmlns:cp="c" xmlns:dc="d" xmlns:dcterms="t">
  <dc:title>Quarterly</dc:title>
  <dc:creator>Kim</dc:creator>
  <cp:keywords>sales, q3</cp:keywords>
  <dcterms:created>2024-03-01T09:30:00Z</dcterms:created>
</cp:coreProperties>"#;
        let (metadata, warnings) = MetadataExtractor.extract(&[source(
            MetadataSourceKind::CoreXml,
            "docProps/core.xml",
            xml.to_vec(),
        )]);
        assert!(warnings.is_empty());
        assert_eq!(metadata.title.as_deref(), Some("Quarterly"));
        assert_eq!(metadata.author.as_deref(), Some("Kim"));
        assert_eq!(metadata.keywords.as_deref(), Some("sales, q3"));
        assert_eq!(metadata.created.map(|d| d.timestamp()), Some(1709285400));
    }

    #[cfg(feature = "ooxml")]
    #[test]
    fn test_opf_meta_names() {
        let xml = r#"<opf:package xmlns:opf="o"><opf:metadata>
<opf:title>제안서</opf:title>
<opf:meta name="creator" content="text">이순신</opf:meta>
</opf:metadata></opf:package>"#;
        let (metadata, _) = MetadataExtractor.extract(&[source(
            MetadataSourceKind::PackageXml,
            "Contents/content.hpf",
            xml.as_bytes().to_vec(),
        )]);
        assert_eq!(metadata.title.as_deref(), Some("제안서"));
        assert_eq!(metadata.author.as_deref(), Some("이순신"));
    }

    #[cfg(feature = "ooxml")]
    #[test]
    fn test_core_xml_entities() {
        let xml = br#"<cp:coreProperties xmlns:cp="c" xmlns:dc="d">
  <dc:title>R&amp;D Report</dc:title>
  <dc:creator>Kim &amp; Lee &#xD55C;</dc:creator>
</cp:coreProperties>"#;
        let (metadata, _) = MetadataExtractor.extract(&[source(
            MetadataSourceKind::CoreXml,
            "docProps/core.xml",
            xml.to_vec(),
        )]);
        assert_eq!(metadata.title.as_deref(), Some("R&D Report"));
        assert_eq!(metadata.author.as_deref(), Some("Kim & Lee \u{D55C}"));
    }
}
