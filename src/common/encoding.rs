//! Character encoding utilities for legacy document formats.
//!
//! Legacy word-processor files rarely say which encoding their text uses,
//! so decoding is done against a short list of candidates and the result
//! is judged by how much of it looks like script text.

use encoding_rs::Encoding;

/// Candidate encodings tried when a byte run has no declared encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    /// Paired 16-bit code units, the native text encoding of HWP 5 records
    Utf16Le,
    /// Korean legacy code page (CP949 superset)
    EucKr,
    Utf8,
}

impl TextEncoding {
    /// Candidates in the order they are tried.
    pub const CANDIDATES: [TextEncoding; 3] =
        [TextEncoding::Utf16Le, TextEncoding::EucKr, TextEncoding::Utf8];

    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf16Le => "UTF-16LE",
            TextEncoding::EucKr => "EUC-KR",
            TextEncoding::Utf8 => "UTF-8",
        }
    }

    fn encoding(self) -> &'static Encoding {
        match self {
            TextEncoding::Utf16Le => encoding_rs::UTF_16LE,
            TextEncoding::EucKr => encoding_rs::EUC_KR,
            TextEncoding::Utf8 => encoding_rs::UTF_8,
        }
    }

    /// Decode bytes, replacing malformed sequences.
    pub fn decode(self, bytes: &[u8]) -> String {
        let (text, _) = self.encoding().decode_without_bom_handling(bytes);
        text.into_owned()
    }
}

/// Map Windows codepage identifier to encoding_rs Encoding.
///
/// Only the codepages property sets commonly declare are mapped; anything
/// else falls back to the caller's default.
///
/// # Examples
/// ```
/// use hwpscan::common::encoding::codepage_to_encoding;
///
/// let encoding = codepage_to_encoding(949).unwrap();
/// assert_eq!(encoding.name(), "EUC-KR");
/// ```
#[inline]
pub fn codepage_to_encoding(codepage: u32) -> Option<&'static Encoding> {
    match codepage {
        874 => Some(encoding_rs::WINDOWS_874),
        932 => Some(encoding_rs::SHIFT_JIS),
        936 => Some(encoding_rs::GBK),
        949 | 1361 => Some(encoding_rs::EUC_KR),
        950 => Some(encoding_rs::BIG5),
        1200 => Some(encoding_rs::UTF_16LE),
        1250 => Some(encoding_rs::WINDOWS_1250),
        1251 => Some(encoding_rs::WINDOWS_1251),
        1252 => Some(encoding_rs::WINDOWS_1252),
        1253 => Some(encoding_rs::WINDOWS_1253),
        1254 => Some(encoding_rs::WINDOWS_1254),
        65001 => Some(encoding_rs::UTF_8),
        _ => None,
    }
}

/// Decode code page bytes, trimming trailing nulls.
pub fn decode_codepage(bytes: &[u8], codepage: Option<u32>) -> String {
    let encoding = codepage
        .and_then(codepage_to_encoding)
        .unwrap_or(encoding_rs::WINDOWS_1252);
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.trim_end_matches('\0').to_string()
}

/// Remove control characters, keeping tabs and line breaks.
///
/// Carriage returns become line feeds and U+FFFD is dropped.
pub fn strip_control(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\r' => Some('\n'),
            '\n' | '\t' => Some(c),
            '\u{FFFD}' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Character class counts for a decoded run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextQuality {
    /// Alphabetic characters of any script, including Hangul and CJK
    pub letters: usize,
    /// Control characters and replacement characters
    pub controls: usize,
    /// Printable ASCII and precomposed Hangul syllables
    pub common: usize,
    pub total: usize,
}

impl TextQuality {
    pub fn measure(text: &str) -> Self {
        let mut quality = TextQuality::default();
        for c in text.chars() {
            quality.total += 1;
            if c == ' ' || c.is_ascii_graphic() || ('\u{AC00}'..='\u{D7A3}').contains(&c) {
                quality.common += 1;
            }
            if c.is_alphabetic() {
                quality.letters += 1;
            } else if c == '\u{FFFD}' || (c.is_control() && c != '\n' && c != '\t') {
                quality.controls += 1;
            }
        }
        quality
    }

    /// Ratio of letters to all characters, 0.0 for empty text.
    pub fn letter_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.letters as f64 / self.total as f64
    }

    /// Whether letters outnumber control characters by at least `ratio`.
    pub fn is_readable(&self, ratio: f64) -> bool {
        self.letters > 0
            && self.letters as f64 >= ratio * self.controls.max(1) as f64
            && self.letter_ratio() >= 0.5
    }
}
