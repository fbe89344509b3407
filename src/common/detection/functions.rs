//! Signature-based format detection.
//!
//! Detection only ever looks at the header window captured during
//! ingestion; it never needs the rest of the file.

use serde::Serialize;

use super::types::{ContainerFlavor, DocumentKind, FormatVersion, HeaderFlags};
use crate::common::binary::read_u32_le;

/// OLE2 compound file magic at offset 0.
pub const OLE_MAGIC: &[u8; 8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// Proprietary record stream magic at offset 0.
pub const HWP_MAGIC: &[u8; 4] = b"HWP ";

/// ZIP local file header magic at offset 0.
pub const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Offset of the little-endian format version.
pub const VERSION_OFFSET: usize = 32;

/// Offset of the little-endian flag word.
pub const FLAGS_OFFSET: usize = 36;

/// Size of the fixed file header preceding the record stream.
pub const FILE_HEADER_LEN: usize = 256;

/// Largest header window ever read before the full body.
pub const HEADER_WINDOW: usize = 512;

/// Number of leading bytes kept in [`FileSignatureInfo::signature`].
pub const SIGNATURE_PREFIX_LEN: usize = 16;

/// Detection result for one request. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSignatureInfo {
    /// Leading bytes of the file
    pub signature: Vec<u8>,
    pub kind: DocumentKind,
    pub flavor: Option<ContainerFlavor>,
    /// Declared format version (proprietary headers only)
    pub version: Option<FormatVersion>,
    pub flags: HeaderFlags,
}

impl FileSignatureInfo {
    /// Classify a header window.
    ///
    /// # Examples
    ///
    /// ```
    /// use hwpscan::common::detection::{DocumentKind, FileSignatureInfo};
    ///
    /// let info = FileSignatureInfo::detect(b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1rest");
    /// assert_eq!(info.kind, DocumentKind::Container);
    /// assert_eq!(FileSignatureInfo::detect(b"nope").kind, DocumentKind::Unknown);
    /// ```
    pub fn detect(header: &[u8]) -> Self {
        let signature = header[..header.len().min(SIGNATURE_PREFIX_LEN)].to_vec();

        if header.starts_with(OLE_MAGIC) {
            return Self::container(signature, ContainerFlavor::Ole);
        }
        if header.starts_with(ZIP_MAGIC) {
            return Self::container(signature, ContainerFlavor::Zip);
        }
        if header.starts_with(HWP_MAGIC) {
            let (version, flags) = parse_file_header(header)
                .map(|(v, f)| (Some(v), f))
                .unwrap_or((None, HeaderFlags::empty()));
            return Self {
                signature,
                kind: DocumentKind::Proprietary,
                flavor: None,
                version,
                flags,
            };
        }

        Self {
            signature,
            kind: DocumentKind::Unknown,
            flavor: None,
            version: None,
            flags: HeaderFlags::empty(),
        }
    }

    fn container(signature: Vec<u8>, flavor: ContainerFlavor) -> Self {
        Self {
            signature,
            kind: DocumentKind::Container,
            flavor: Some(flavor),
            version: None,
            flags: HeaderFlags::empty(),
        }
    }

    #[inline]
    pub fn compressed(&self) -> bool {
        self.flags.contains(HeaderFlags::COMPRESSED)
    }

    #[inline]
    pub fn encrypted(&self) -> bool {
        self.flags.contains(HeaderFlags::ENCRYPTED)
    }

    /// Leading bytes rendered as hex, for diagnostics.
    pub fn signature_hex(&self) -> String {
        self.signature.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

/// Whether a header window starts with any accepted signature.
pub fn has_known_signature(header: &[u8]) -> bool {
    header.starts_with(OLE_MAGIC) || header.starts_with(HWP_MAGIC) || header.starts_with(ZIP_MAGIC)
}

/// Read version and flags from a 256-byte file header.
///
/// The same layout is stored in the proprietary file prefix and in the
/// `FileHeader` stream of OLE documents.
pub fn parse_file_header(header: &[u8]) -> Option<(FormatVersion, HeaderFlags)> {
    let version = read_u32_le(header, VERSION_OFFSET).ok()?;
    let flags = read_u32_le(header, FLAGS_OFFSET).ok()?;
    Some((
        FormatVersion::from_u32(version),
        HeaderFlags::from_bits_retain(flags),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn proprietary_header(version: u32, flags: u32) -> Vec<u8> {
        let mut header = vec![0u8; FILE_HEADER_LEN];
        header[..17].copy_from_slice(b"HWP Document File");
        header[VERSION_OFFSET..VERSION_OFFSET + 4].copy_from_slice(&version.to_le_bytes());
        header[FLAGS_OFFSET..FLAGS_OFFSET + 4].copy_from_slice(&flags.to_le_bytes());
        header
    }

    #[test]
    fn test_detect_proprietary_header_fields() {
        let info = FileSignatureInfo::detect(&proprietary_header(0x0500_0300, 0b11));
        assert_eq!(info.kind, DocumentKind::Proprietary);
        assert_eq!(info.version.map(|v| v.to_string()), Some("5.0.3.0".to_string()));
        assert!(info.compressed());
        assert!(info.encrypted());
    }

    #[test]
    fn test_detect_short_proprietary_header() {
        let info = FileSignatureInfo::detect(b"HWP Doc");
        assert_eq!(info.kind, DocumentKind::Proprietary);
        assert_eq!(info.version, None);
        assert!(!info.compressed());
    }

    #[test]
    fn test_detect_zip_container() {
        let info = FileSignatureInfo::detect(b"PK\x03\x04\x14\x00");
        assert_eq!(info.kind, DocumentKind::Container);
        assert_eq!(info.flavor, Some(ContainerFlavor::Zip));
    }

    #[test]
    fn test_signature_hex() {
        let info = FileSignatureInfo::detect(b"HWP ");
        assert_eq!(info.signature_hex(), "48575020");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_ole_magic_is_container(tail in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut data = OLE_MAGIC.to_vec();
            data.extend(tail);
            prop_assert_eq!(FileSignatureInfo::detect(&data).kind, DocumentKind::Container);
        }

        #[test]
        fn prop_hwp_magic_is_proprietary(tail in proptest::collection::vec(any::<u8>(), 0..64)) {
            let mut data = HWP_MAGIC.to_vec();
            data.extend(tail);
            prop_assert_eq!(FileSignatureInfo::detect(&data).kind, DocumentKind::Proprietary);
        }

        #[test]
        fn prop_other_prefixes_are_unknown(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            prop_assume!(!has_known_signature(&data));
            prop_assert_eq!(FileSignatureInfo::detect(&data).kind, DocumentKind::Unknown);
        }
    }
}
