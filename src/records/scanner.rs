use serde::Serialize;
use tracing::debug;

use super::cursor::RecordCursor;
use crate::common::encoding::{TextEncoding, TextQuality, strip_control};

/// Confidence reported for text decoded from record tokens.
pub const TOKEN_CONFIDENCE: f64 = 0.7;

/// Confidence reported for text recovered by the windowed heuristic.
pub const HEURISTIC_CONFIDENCE: f64 = 0.3;

/// How a [`ScanReport`] obtained its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMethod {
    Tokens,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub text: String,
    pub method: ScanMethod,
    /// Valid tokens seen, textual or not
    pub records: usize,
    pub textual_records: usize,
    pub skipped_bytes: usize,
    /// Heuristic windows kept, with the encoding each decoded under
    pub windows: Vec<(usize, &'static str)>,
}

impl ScanReport {
    pub fn confidence(&self) -> f64 {
        match self.method {
            ScanMethod::Tokens => TOKEN_CONFIDENCE,
            ScanMethod::Heuristic => HEURISTIC_CONFIDENCE,
        }
    }
}

/// Tokenizing scanner with a windowed text heuristic fallback.
#[derive(Debug, Clone, Copy)]
pub struct RecordScanner {
    /// Heuristic window size in bytes
    pub window: usize,
    /// Letters required per control character in a kept window
    pub min_ratio: f64,
    /// Letters required in a kept window
    pub min_letters: usize,
}

impl Default for RecordScanner {
    fn default() -> Self {
        Self {
            window: 512,
            min_ratio: 4.0,
            min_letters: 8,
        }
    }
}

impl RecordScanner {
    pub fn scan(&self, data: &[u8]) -> ScanReport {
        let mut cursor = RecordCursor::new(data);
        let mut records = 0;
        let mut textual = 0;
        let mut parts = Vec::new();

        for record in cursor.by_ref() {
            records += 1;
            if let Some(text) = record.decode_text() {
                textual += 1;
                if !text.trim().is_empty() {
                    parts.push(text);
                }
            }
        }
        let skipped_bytes = cursor.skipped();

        if records > 0 {
            debug!(records, textual, skipped_bytes, "record tokens found");
            return ScanReport {
                text: parts.join("\n"),
                method: ScanMethod::Tokens,
                records,
                textual_records: textual,
                skipped_bytes,
                windows: Vec::new(),
            };
        }

        let (text, windows) = self.heuristic(data);
        debug!(kept = windows.len(), "no record tokens; used windowed heuristic");
        ScanReport {
            text,
            method: ScanMethod::Heuristic,
            records: 0,
            textual_records: 0,
            skipped_bytes,
            windows,
        }
    }

    /// Decode fixed windows under every candidate encoding and keep the
    /// readable ones.
    fn heuristic(&self, data: &[u8]) -> (String, Vec<(usize, &'static str)>) {
        let window = self.window.max(2);
        let mut kept = Vec::new();
        let mut parts = Vec::new();

        for start in (0..data.len()).step_by(window) {
            let best = TextEncoding::CANDIDATES
                .iter()
                .filter_map(|&encoding| {
                    let (offset, len, decoded) = decode_window(data, start, window, encoding);
                    let quality = TextQuality::measure(&decoded);
                    let readable = len > 0
                        && quality.letters >= self.min_letters
                        && quality.is_readable(self.min_ratio);
                    readable.then(|| (encoding, offset, decoded, quality.letters as f64 / len as f64))
                })
                // letters per input byte; earlier candidates win ties
                .fold(None::<(TextEncoding, usize, String, f64)>, |best, candidate| match best {
                    Some(b) if b.3 >= candidate.3 => Some(b),
                    _ => Some(candidate),
                });

            if let Some((encoding, offset, decoded, _)) = best {
                let cleaned = strip_control(&decoded);
                let cleaned = cleaned.trim();
                if !cleaned.is_empty() {
                    parts.push(cleaned.to_string());
                    kept.push((offset, encoding.name()));
                }
            }
        }

        (parts.join("\n"), kept)
    }
}

/// Decode the window at `start`, returning its offset, byte length and text.
///
/// UTF-16LE is tried at both byte alignments and the decoding with more
/// common characters is kept, the even one on a tie.
fn decode_window(
    data: &[u8],
    start: usize,
    window: usize,
    encoding: TextEncoding,
) -> (usize, usize, String) {
    let slice = |from: usize| {
        let from = from.min(data.len());
        &data[from..(from + window).min(data.len())]
    };
    let even = slice(start);
    let decoded = encoding.decode(even);
    if encoding != TextEncoding::Utf16Le {
        return (start, even.len(), decoded);
    }

    let odd = slice(start + 1);
    let shifted = encoding.decode(odd);
    if TextQuality::measure(&shifted).common > TextQuality::measure(&decoded).common {
        (start + 1, odd.len(), shifted)
    } else {
        (start, even.len(), decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn test_tokens_take_priority() {
        let payload = utf16("제목입니다");
        let mut data = b"TITL".to_vec();
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&payload);
        let report = RecordScanner::default().scan(&data);
        assert_eq!(report.method, ScanMethod::Tokens);
        assert_eq!(report.text, "제목입니다");
        assert_eq!(report.confidence(), TOKEN_CONFIDENCE);
    }

    #[test]
    fn test_heuristic_recovers_utf16_text() {
        let data = utf16(&"한글 문서 본문 텍스트 ".repeat(40));
        let report = RecordScanner::default().scan(&data);
        assert_eq!(report.method, ScanMethod::Heuristic);
        assert!(report.text.contains("한글 문서"));
        assert!(report.windows.iter().all(|(_, enc)| *enc == "UTF-16LE"));
        assert!(report.confidence() < TOKEN_CONFIDENCE);
    }

    #[test]
    fn test_heuristic_recovers_odd_aligned_utf16() {
        let mut data = vec![0x01];
        data.extend(utf16(&"이 문서는 레코드 토큰 없이 저장된 본문입니다. ".repeat(40)));
        let report = RecordScanner::default().scan(&data);
        assert_eq!(report.method, ScanMethod::Heuristic);
        assert!(report.text.contains("레코드"));
        assert!(!report.windows.is_empty());
        assert!(
            report
                .windows
                .iter()
                .all(|(offset, enc)| offset % 2 == 1 && *enc == "UTF-16LE")
        );
    }

    #[test]
    fn test_heuristic_recovers_euc_kr_text() {
        let text = "보고서입니다".repeat(30);
        let (bytes, _, _) = encoding_rs::EUC_KR.encode(&text);
        let report = RecordScanner::default().scan(&bytes);
        assert_eq!(report.method, ScanMethod::Heuristic);
        assert!(!report.text.is_empty());
    }

    #[test]
    fn test_heuristic_rejects_noise() {
        let noise: Vec<u8> = (0..4096u32)
            .map(|i| if i % 2 == 0 { (i % 9) as u8 } else { 0 })
            .collect();
        let report = RecordScanner::default().scan(&noise);
        assert!(report.text.is_empty());
        assert!(report.windows.is_empty());
    }

    proptest! {
        #[test]
        fn prop_scan_never_panics(data in proptest::collection::vec(any::<u8>(), 0..8192)) {
            let report = RecordScanner::default().scan(&data);
            prop_assert!(report.skipped_bytes <= data.len());
        }
    }
}
