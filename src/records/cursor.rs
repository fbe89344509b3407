use crate::common::encoding::strip_control;

/// Largest payload a record token may declare.
pub const MAX_RECORD_LEN: u32 = 1024 * 1024;

/// Tag plus little-endian length.
pub const RECORD_HEADER_LEN: usize = 8;

/// Tags whose payload is UTF-16LE text.
pub const TEXT_TAGS: [&[u8; 4]; 6] = [b"TEXT", b"PARA", b"TITL", b"HEAD", b"FOOT", b"NOTE"];

/// One tag-length-value token, borrowed from the scanned buffer.
///
/// A `BinaryRecord` can only be obtained from [`RecordCursor`], which
/// guarantees the declared length is in `1..=MAX_RECORD_LEN` and that the
/// payload lies inside the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryRecord<'a> {
    tag: [u8; 4],
    offset: usize,
    payload: &'a [u8],
}

impl<'a> BinaryRecord<'a> {
    /// The four-byte type tag
    #[inline]
    pub fn tag(&self) -> [u8; 4] {
        self.tag
    }

    /// Tag as text; tags are always printable ASCII.
    pub fn tag_str(&self) -> &str {
        std::str::from_utf8(&self.tag).unwrap_or("????")
    }

    /// Offset of the record header within the scanned buffer
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn declared_len(&self) -> u32 {
        self.payload.len() as u32
    }

    #[inline]
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn is_textual(&self) -> bool {
        TEXT_TAGS.iter().any(|t| **t == self.tag)
    }

    /// Decode a textual payload as UTF-16LE with control characters removed.
    ///
    /// Returns `None` for non-textual tags.
    pub fn decode_text(&self) -> Option<String> {
        if !self.is_textual() {
            return None;
        }
        let units = crate::common::binary::utf16le_units(self.payload);
        let raw: String = char::decode_utf16(units)
            .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        Some(strip_control(&raw))
    }
}

/// Forward-only cursor over an immutable byte range.
///
/// Positions that do not start a well-formed token are skipped one byte at
/// a time; a valid token advances the cursor past its payload.
#[derive(Debug, Clone)]
pub struct RecordCursor<'a> {
    data: &'a [u8],
    pos: usize,
    skipped: usize,
}

impl<'a> RecordCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            skipped: 0,
        }
    }

    /// Current position in the buffer
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes stepped over because no token started there
    #[inline]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn token_at(&self, pos: usize) -> Option<BinaryRecord<'a>> {
        let header = self.data.get(pos..pos.checked_add(RECORD_HEADER_LEN)?)?;
        let tag: [u8; 4] = header[..4].try_into().ok()?;
        if !is_tag(&tag) {
            return None;
        }
        let len = u32::from_le_bytes(header[4..8].try_into().ok()?);
        if len == 0 || len > MAX_RECORD_LEN {
            return None;
        }
        let start = pos + RECORD_HEADER_LEN;
        let payload = self.data.get(start..start.checked_add(len as usize)?)?;
        Some(BinaryRecord {
            tag,
            offset: pos,
            payload,
        })
    }
}

impl<'a> Iterator for RecordCursor<'a> {
    type Item = BinaryRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos + RECORD_HEADER_LEN <= self.data.len() {
            if let Some(record) = self.token_at(self.pos) {
                self.pos += RECORD_HEADER_LEN + record.payload.len();
                return Some(record);
            }
            self.pos += 1;
            self.skipped += 1;
        }
        None
    }
}

/// Tags start with an uppercase letter and continue with uppercase
/// letters, digits or spaces.
fn is_tag(tag: &[u8; 4]) -> bool {
    tag[0].is_ascii_uppercase()
        && tag[1..]
            .iter()
            .all(|&b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn token(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn utf16(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    #[test]
    fn test_single_textual_record() {
        let data = token(b"TEXT", &utf16("안녕\u{1}하세요"));
        let records: Vec<_> = RecordCursor::new(&data).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag_str(), "TEXT");
        assert_eq!(records[0].offset(), 0);
        assert_eq!(records[0].decode_text().as_deref(), Some("안녕하세요"));
    }

    #[test]
    fn test_garbage_between_records_is_skipped() {
        let mut data = vec![0xFF, 0x00, 0x13];
        data.extend(token(b"PARA", &utf16("one")));
        data.extend([0u8; 5]);
        data.extend(token(b"IMG1", &[1, 2, 3]));
        let mut cursor = RecordCursor::new(&data);
        let tags: Vec<_> = cursor.by_ref().map(|r| r.tag()).collect();
        assert_eq!(tags, vec![*b"PARA", *b"IMG1"]);
        assert_eq!(cursor.skipped(), 3 + 5);
    }

    #[test]
    fn test_rejects_bad_lengths() {
        // zero length
        assert_eq!(RecordCursor::new(&token(b"TEXT", &[])).count(), 0);
        // longer than the buffer
        let mut data = b"TEXT".to_vec();
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(&[0x41, 0x00]);
        assert_eq!(RecordCursor::new(&data).count(), 0);
        // above the sanity bound
        let mut data = b"TEXT".to_vec();
        data.extend_from_slice(&(MAX_RECORD_LEN + 1).to_le_bytes());
        assert_eq!(RecordCursor::new(&data).count(), 0);
    }

    #[test]
    fn test_non_textual_has_no_text() {
        let data = token(b"BIN0", &utf16("x"));
        let record = RecordCursor::new(&data).next().unwrap();
        assert!(!record.is_textual());
        assert!(record.decode_text().is_none());
    }

    proptest! {
        #[test]
        fn prop_records_stay_in_bounds(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            for record in RecordCursor::new(&data) {
                let end = record.offset() + RECORD_HEADER_LEN + record.payload().len();
                prop_assert!(end <= data.len());
                prop_assert!(record.declared_len() > 0 && record.declared_len() <= MAX_RECORD_LEN);
            }
        }
    }
}
