//! HWP 5 body-stream records.
//!
//! Each record starts with a 32-bit header: tag id in bits 0..10, level in
//! bits 10..20, size in bits 20..32. A size of `0xFFF` means the real size
//! follows as a separate 32-bit value.

use crate::common::binary::{read_u32_le, utf16le_units};

pub const HWPTAG_BEGIN: u16 = 0x010;
pub const HWPTAG_PARA_HEADER: u16 = HWPTAG_BEGIN + 50;
pub const HWPTAG_PARA_TEXT: u16 = HWPTAG_BEGIN + 51;
pub const HWPTAG_TABLE: u16 = HWPTAG_BEGIN + 61;
pub const HWPTAG_SHAPE_COMPONENT_PICTURE: u16 = HWPTAG_BEGIN + 69;
pub const HWPTAG_CHART_DATA: u16 = HWPTAG_BEGIN + 79;

const EXTENDED_SIZE: u32 = 0xFFF;

/// One body record, borrowing its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hwp5Record<'a> {
    pub tag: u16,
    pub level: u16,
    pub payload: &'a [u8],
}

/// Iterator over the records of a decompressed body stream.
///
/// Iteration ends at the first record whose header or payload runs past
/// the end of the stream; [`Hwp5Records::truncated`] reports whether that
/// happened.
#[derive(Debug, Clone)]
pub struct Hwp5Records<'a> {
    data: &'a [u8],
    pos: usize,
    truncated: bool,
}

impl<'a> Hwp5Records<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            truncated: false,
        }
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

impl<'a> Iterator for Hwp5Records<'a> {
    type Item = Hwp5Record<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let Ok(header) = read_u32_le(self.data, self.pos) else {
            self.truncated = true;
            return None;
        };
        let tag = (header & 0x3FF) as u16;
        let level = ((header >> 10) & 0x3FF) as u16;
        let mut size = header >> 20;
        let mut start = self.pos + 4;
        if size == EXTENDED_SIZE {
            let Ok(extended) = read_u32_le(self.data, start) else {
                self.truncated = true;
                return None;
            };
            size = extended;
            start += 4;
        }
        let Some(payload) = start
            .checked_add(size as usize)
            .and_then(|end| self.data.get(start..end))
        else {
            self.truncated = true;
            self.pos = self.data.len();
            return None;
        };
        self.pos = start + payload.len();
        Some(Hwp5Record {
            tag,
            level,
            payload,
        })
    }
}

/// Decode a `PARA_TEXT` payload.
///
/// Code units below 32 are controls. Line breaks and tabs are kept, a
/// paragraph break ends the text, char controls take one unit and inline
/// or extended controls take eight.
pub fn decode_para_text(payload: &[u8]) -> String {
    let units: Vec<u16> = utf16le_units(payload).collect();
    let mut text = String::with_capacity(units.len());
    let mut plain = Vec::new();
    let mut i = 0;

    let flush = |plain: &mut Vec<u16>, text: &mut String| {
        text.extend(
            char::decode_utf16(plain.drain(..)).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
        );
    };

    while i < units.len() {
        let unit = units[i];
        if unit >= 32 {
            plain.push(unit);
            i += 1;
            continue;
        }
        flush(&mut plain, &mut text);
        match unit {
            10 => {
                text.push('\n');
                i += 1;
            },
            13 => break,
            9 => {
                text.push('\t');
                i += 8;
            },
            0 | 24..=31 => i += 1,
            _ => i += 8,
        }
    }
    flush(&mut plain, &mut text);
    text.retain(|c| c != '\u{FFFD}');
    text
}

/// Text and object counts from one body section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionSummary {
    pub text: String,
    pub paragraphs: usize,
    pub tables: usize,
    pub pictures: usize,
    pub charts: usize,
    pub truncated: bool,
}

/// Walk a decompressed section stream.
pub fn decode_section(data: &[u8]) -> SectionSummary {
    let mut summary = SectionSummary::default();
    let mut records = Hwp5Records::new(data);
    let mut lines: Vec<String> = Vec::new();

    for record in records.by_ref() {
        match record.tag {
            HWPTAG_PARA_HEADER => summary.paragraphs += 1,
            HWPTAG_PARA_TEXT => lines.push(decode_para_text(record.payload)),
            HWPTAG_TABLE => summary.tables += 1,
            HWPTAG_SHAPE_COMPONENT_PICTURE => summary.pictures += 1,
            HWPTAG_CHART_DATA => summary.charts += 1,
            _ => {},
        }
    }

    summary.truncated = records.truncated();
    summary.text = lines.join("\n");
    summary
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encode a record with a short or extended size field.
    pub(crate) fn record(tag: u16, level: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let size = payload.len() as u32;
        let short = if size >= EXTENDED_SIZE { EXTENDED_SIZE } else { size };
        let header = (tag as u32 & 0x3FF) | ((level as u32 & 0x3FF) << 10) | (short << 20);
        out.extend_from_slice(&header.to_le_bytes());
        if short == EXTENDED_SIZE {
            out.extend_from_slice(&size.to_le_bytes());
        }
        out.extend_from_slice(payload);
        out
    }

    pub(crate) fn para_text(s: &str) -> Vec<u8> {
        s.encode_utf16()
            .chain(std::iter::once(13))
            .flat_map(|u| u.to_le_bytes())
            .collect()
    }

    #[test]
    fn test_header_fields() {
        let data = record(HWPTAG_PARA_TEXT, 1, &[0x41, 0x00]);
        let rec = Hwp5Records::new(&data).next().unwrap();
        assert_eq!(rec.tag, HWPTAG_PARA_TEXT);
        assert_eq!(rec.level, 1);
        assert_eq!(rec.payload, &[0x41, 0x00]);
    }

    #[test]
    fn test_extended_size() {
        let payload = vec![0x20u8; 5000];
        let data = record(HWPTAG_PARA_TEXT, 0, &payload);
        let rec = Hwp5Records::new(&data).next().unwrap();
        assert_eq!(rec.payload.len(), 5000);
    }

    #[test]
    fn test_truncated_payload_stops_iteration() {
        let mut data = record(HWPTAG_PARA_HEADER, 0, &[0; 4]);
        let mut bad = record(HWPTAG_PARA_TEXT, 0, &[0; 40]);
        bad.truncate(10);
        data.extend(bad);
        let mut records = Hwp5Records::new(&data);
        assert_eq!(records.by_ref().count(), 1);
        assert!(records.truncated());
    }

    #[test]
    fn test_para_text_controls() {
        let mut units: Vec<u16> = "가나".encode_utf16().collect();
        // extended control occupies eight units
        units.extend([11, 0x6F74, 0x6C62, 0, 0, 0, 0, 11]);
        units.extend("다\t".encode_utf16());
        units.extend([0u16; 7]);
        units.push(10);
        units.extend("라".encode_utf16());
        units.push(13);
        units.extend("ignored".encode_utf16());
        let payload: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(decode_para_text(&payload), "가나다\t\n라");
    }

    #[test]
    fn test_decode_section_counts() {
        let mut data = record(HWPTAG_PARA_HEADER, 0, &[0; 22]);
        data.extend(record(HWPTAG_PARA_TEXT, 1, &para_text("첫 문단")));
        data.extend(record(HWPTAG_TABLE, 2, &[0; 8]));
        data.extend(record(HWPTAG_PARA_HEADER, 0, &[0; 22]));
        data.extend(record(HWPTAG_PARA_TEXT, 1, &para_text("둘째 문단")));
        data.extend(record(HWPTAG_SHAPE_COMPONENT_PICTURE, 3, &[0; 8]));
        let summary = decode_section(&data);
        assert_eq!(summary.text, "첫 문단\n둘째 문단");
        assert_eq!(summary.paragraphs, 2);
        assert_eq!(summary.tables, 1);
        assert_eq!(summary.pictures, 1);
        assert!(!summary.truncated);
    }
}
