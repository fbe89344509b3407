//! Proprietary tag-length-value record scanning.
//!
//! The record stream is a sequence of tokens: a four-byte type tag, a
//! four-byte little-endian declared length, then the payload. Scanning is
//! tolerant: malformed positions are stepped over one byte at a time and
//! never end the scan. When no token is found at all, a windowed text
//! heuristic recovers whatever readable runs the buffer contains, at a
//! lower confidence.

mod cursor;
mod scanner;

pub use cursor::{BinaryRecord, MAX_RECORD_LEN, RECORD_HEADER_LEN, RecordCursor, TEXT_TAGS};
pub use scanner::{HEURISTIC_CONFIDENCE, RecordScanner, ScanMethod, ScanReport, TOKEN_CONFIDENCE};
