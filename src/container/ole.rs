use std::io::Cursor;

use bytes::Bytes;
use tracing::{debug, warn};

use super::{ContainerDocument, ContainerEntry, MetadataSource, MetadataSourceKind, hwp5};
use super::{is_image_name, numbered};
use crate::common::binary::parse_utf16le_string;
use crate::common::detection::{ContainerFlavor, HeaderFlags, parse_file_header};
use crate::common::encoding::strip_control;
use crate::common::error::Result;
use crate::decompress::Decompressor;
use crate::ole::consts::{
    DOCUMENT_SUMMARY_INFORMATION, HWP_BIN_DATA, HWP_BODY_TEXT, HWP_FILE_HEADER, HWP_PREVIEW_TEXT,
    HWP_SECTION_PREFIX, HWP_SUMMARY_INFORMATION, HWP_VIEW_TEXT, SUMMARY_INFORMATION,
};
use crate::ole::{OleError, OleFile, StreamInfo};

type Ole = OleFile<Cursor<Bytes>>;

const PROPERTY_STREAMS: [&str; 3] = [
    HWP_SUMMARY_INFORMATION,
    SUMMARY_INFORMATION,
    DOCUMENT_SUMMARY_INFORMATION,
];

pub(super) fn parse_ole(data: &Bytes, decompressor: &Decompressor) -> Result<ContainerDocument> {
    let mut ole = OleFile::open(Cursor::new(data.clone()))?;
    let infos = ole.stream_infos();
    let entries = infos
        .iter()
        .map(|info| ContainerEntry {
            name: info.path.join("/"),
            offset: info.offset,
            length: info.size,
        })
        .collect();
    let mut doc = ContainerDocument::new(ContainerFlavor::Ole, entries);
    debug!(streams = doc.entries.len(), "OLE container opened");

    // Without a file header the codecs decide whether bodies are compressed
    let compressed = match read_optional(&mut ole, &[HWP_FILE_HEADER], &mut doc.warnings)
        .as_deref()
        .and_then(parse_file_header)
    {
        Some((version, flags)) => {
            doc.version = Some(version);
            doc.flags = flags;
            flags.contains(HeaderFlags::COMPRESSED)
        },
        None => true,
    };

    let body = sections_in(&infos, HWP_BODY_TEXT);
    let view = sections_in(&infos, HWP_VIEW_TEXT);
    doc.sections = body.len().max(view.len());

    if doc.flags.contains(HeaderFlags::ENCRYPTED) {
        warn!("document is encrypted; skipping body streams");
        doc.warnings
            .push("document is encrypted; body text not decoded".to_string());
    } else if body.is_empty() && !view.is_empty() {
        doc.warnings
            .push("distribution document; body text not decoded".to_string());
    } else {
        read_sections(&mut ole, &body, compressed, decompressor, &mut doc);
    }

    if let Some(preview) = read_optional(&mut ole, &[HWP_PREVIEW_TEXT], &mut doc.warnings) {
        doc.preview_text = strip_control(&parse_utf16le_string(&preview));
    }

    let bin_images = infos
        .iter()
        .filter(|info| {
            info.path.len() == 2
                && info.path[0].eq_ignore_ascii_case(HWP_BIN_DATA)
                && is_image_name(&info.path[1])
        })
        .count();
    doc.objects.images = doc.objects.images.max(bin_images);

    for name in PROPERTY_STREAMS {
        if let Some(data) = read_optional(&mut ole, &[name], &mut doc.warnings) {
            doc.metadata_sources.push(MetadataSource {
                name: name.trim_start_matches('\u{5}').to_string(),
                kind: MetadataSourceKind::PropertySet,
                data,
            });
        }
    }

    Ok(doc)
}

/// Section stream paths under `storage`, in section order.
fn sections_in(infos: &[StreamInfo], storage: &str) -> Vec<Vec<String>> {
    let mut sections: Vec<(u32, Vec<String>)> = infos
        .iter()
        .filter(|info| info.path.len() == 2 && info.path[0].eq_ignore_ascii_case(storage))
        .filter_map(|info| {
            numbered(&info.path[1], HWP_SECTION_PREFIX, "").map(|n| (n, info.path.clone()))
        })
        .collect();
    sections.sort_by_key(|(n, _)| *n);
    sections.into_iter().map(|(_, path)| path).collect()
}

fn read_sections(
    ole: &mut Ole,
    sections: &[Vec<String>],
    compressed: bool,
    decompressor: &Decompressor,
    doc: &mut ContainerDocument,
) {
    let mut texts = Vec::with_capacity(sections.len());
    let mut pictures = 0;

    for path in sections {
        let name = path.join("/");
        let parts: Vec<&str> = path.iter().map(String::as_str).collect();
        let raw = match ole.open_stream(&parts) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(stream = %name, error = %e, "unreadable section stream");
                doc.warnings.push(format!("{}: {}", name, e));
                continue;
            },
        };

        let decoded = decompressor.decompress(&raw, compressed);
        if let Some(warning) = decoded.warning {
            doc.warnings.push(format!("{}: {}", name, warning));
        }

        let summary = hwp5::decode_section(&decoded.data);
        if summary.truncated {
            doc.warnings
                .push(format!("{}: truncated record stream", name));
        }
        debug!(
            stream = %name,
            bytes = decoded.data.len(),
            paragraphs = summary.paragraphs,
            "section decoded"
        );

        doc.objects.tables += summary.tables;
        doc.objects.charts += summary.charts;
        pictures += summary.pictures;
        if !summary.text.trim().is_empty() {
            texts.push(summary.text);
        }
    }

    doc.objects.images = doc.objects.images.max(pictures);
    doc.body_text = texts.join("\n");
}

/// Read a stream, treating absence as `None` and other failures as warnings.
fn read_optional(ole: &mut Ole, path: &[&str], warnings: &mut Vec<String>) -> Option<Vec<u8>> {
    match ole.open_stream(path) {
        Ok(data) => Some(data),
        Err(OleError::StreamNotFound) => None,
        Err(e) => {
            warnings.push(format!("{}: {}", path.join("/"), e));
            None
        },
    }
}
