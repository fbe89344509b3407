//! ZIP packages: HWPX documents, slide decks and word-processing packages.

use std::io::{Cursor, Read};

use bytes::Bytes;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};
use zip::ZipArchive;

use super::{ContainerDocument, ContainerEntry, MetadataSource, MetadataSourceKind};
use super::{is_image_name, numbered};
use crate::common::detection::ContainerFlavor;
use crate::common::error::Result;
use crate::decompress::Decompressor;

/// Body part families, tried in order until one is present.
const BODY_PARTS: &[(&str, &str, &str)] = &[
    ("Contents/", "section", ".xml"),
    ("ppt/slides/", "slide", ".xml"),
    ("word/", "document", ".xml"),
];

const PREVIEW_PART: &str = "Preview/PrvText.txt";

const METADATA_PARTS: &[(&str, MetadataSourceKind)] = &[
    ("docProps/core.xml", MetadataSourceKind::CoreXml),
    ("Contents/content.hpf", MetadataSourceKind::PackageXml),
];

const MEDIA_DIRS: &[&str] = &["BinData/", "ppt/media/", "word/media/"];
const CHART_DIRS: &[&str] = &["Chart/", "Charts/", "ppt/charts/", "word/charts/"];

type Archive = ZipArchive<Cursor<Bytes>>;

pub(super) fn parse_zip(data: &Bytes, decompressor: &Decompressor) -> Result<ContainerDocument> {
    let mut archive = ZipArchive::new(Cursor::new(data.clone()))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        entries.push(ContainerEntry {
            name: file.name().to_string(),
            offset: file.header_start(),
            length: file.size(),
        });
    }
    let mut doc = ContainerDocument::new(ContainerFlavor::Zip, entries);
    debug!(entries = doc.entries.len(), "ZIP container opened");

    let limit = decompressor.max_output();
    let bodies = body_parts(&doc.entries);
    doc.sections = bodies.len();

    let mut texts = Vec::with_capacity(bodies.len());
    for name in &bodies {
        let Some(xml) = read_entry(&mut archive, name, limit, &mut doc.warnings) else {
            continue;
        };
        match xml_text(&xml) {
            Ok((text, tables)) => {
                doc.objects.tables += tables;
                if !text.trim().is_empty() {
                    texts.push(text);
                }
            },
            Err(e) => {
                warn!(entry = %name, error = %e, "malformed XML part");
                doc.warnings.push(format!("{}: {}", name, e));
            },
        }
    }
    doc.body_text = texts.join("\n");

    if let Some(preview) = read_entry(&mut archive, PREVIEW_PART, limit, &mut doc.warnings) {
        doc.preview_text = String::from_utf8_lossy(&preview).trim().to_string();
    }

    doc.objects.images = doc
        .entries
        .iter()
        .filter(|e| in_dirs(&e.name, MEDIA_DIRS) && is_image_name(&e.name))
        .count();
    doc.objects.charts = doc
        .entries
        .iter()
        .filter(|e| in_dirs(&e.name, CHART_DIRS) && e.name.ends_with(".xml"))
        .count();

    for (name, kind) in METADATA_PARTS {
        if let Some(data) = read_entry(&mut archive, name, limit, &mut doc.warnings) {
            doc.metadata_sources.push(MetadataSource {
                name: name.to_string(),
                kind: *kind,
                data,
            });
        }
    }

    Ok(doc)
}

fn in_dirs(name: &str, dirs: &[&str]) -> bool {
    dirs.iter().any(|d| name.starts_with(d))
}

/// Names of the first present body part family, in numeric order.
fn body_parts(entries: &[ContainerEntry]) -> Vec<String> {
    for (dir, prefix, suffix) in BODY_PARTS {
        let mut parts: Vec<(u32, String)> = entries
            .iter()
            .filter_map(|e| {
                let file = e.name.strip_prefix(dir)?;
                if file.contains('/') {
                    return None;
                }
                let n = if file.eq_ignore_ascii_case(&format!("{prefix}{suffix}")) {
                    0
                } else {
                    numbered(file, prefix, suffix)?
                };
                Some((n, e.name.clone()))
            })
            .collect();
        if !parts.is_empty() {
            parts.sort_by_key(|(n, _)| *n);
            return parts.into_iter().map(|(_, name)| name).collect();
        }
    }
    Vec::new()
}

/// Read one entry, bounded by `limit` bytes of decompressed output.
fn read_entry(
    archive: &mut Archive,
    name: &str,
    limit: u64,
    warnings: &mut Vec<String>,
) -> Option<Vec<u8>> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return None,
        Err(e) => {
            warnings.push(format!("{}: {}", name, e));
            return None;
        },
    };
    let mut data = Vec::new();
    if let Err(e) = file.take(limit.saturating_add(1)).read_to_end(&mut data) {
        warnings.push(format!("{}: {}", name, e));
        return None;
    }
    if data.len() as u64 > limit {
        warnings.push(format!("{}: exceeds {} byte output limit", name, limit));
        return None;
    }
    Some(data)
}

/// Text of every `t` element, one line per `p` element, plus the number of
/// `tbl` elements.
pub(crate) fn xml_text(xml: &[u8]) -> Result<(String, usize)> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_text = false;
    let mut tables = 0;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tbl" => tables += 1,
                _ => {},
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" if in_text => text.push('\t'),
                b"lineBreak" | b"br" => text.push('\n'),
                b"tbl" => tables += 1,
                _ => {},
            },
            Event::Text(e) if in_text => {
                text.push_str(&String::from_utf8_lossy(&e));
            },
            Event::CData(e) if in_text => {
                text.push_str(&String::from_utf8_lossy(&e));
            },
            Event::GeneralRef(e) if in_text => {
                if let Some(c) = resolve_entity(&String::from_utf8_lossy(&e)) {
                    text.push(c);
                }
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" if !text.is_empty() && !text.ends_with('\n') => text.push('\n'),
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
        buf.clear();
    }

    Ok((text.trim_end().to_string(), tables))
}

pub(crate) fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        },
    }
}
