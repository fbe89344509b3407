//! Format classification types.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// What a buffer looks like from its fixed-offset signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// A structured container holding named streams or entries
    Container,
    /// The legacy word-processor record stream
    Proprietary,
    /// Nothing recognized; downstream stages degrade instead of failing
    Unknown,
}

/// Which container layout a [`DocumentKind::Container`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFlavor {
    /// OLE2 compound file (HWP 5, legacy Office)
    Ole,
    /// ZIP archive (HWPX, slide decks)
    Zip,
}

bitflags! {
    /// Flag word stored at offset 36 of the file header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct HeaderFlags: u32 {
        /// Body streams are deflate-compressed
        const COMPRESSED = 0x0001;
        /// Body streams are password-encrypted
        const ENCRYPTED = 0x0002;
        /// Distribution document (body moved to ViewText)
        const DISTRIBUTION = 0x0004;
        /// Document scripts are stored
        const SCRIPT = 0x0008;
        /// DRM protected
        const DRM = 0x0010;
        /// XML template storage present
        const XML_TEMPLATE = 0x0020;
        /// Document history is stored
        const HISTORY = 0x0040;
        /// Electronic signature present
        const SIGNED = 0x0080;
        /// Certificate-encrypted
        const CERT_ENCRYPTED = 0x0100;
    }
}

/// Packed `MM.nn.PP.rr` format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormatVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
    pub revision: u8,
}

impl FormatVersion {
    pub fn from_u32(raw: u32) -> Self {
        Self {
            major: (raw >> 24) as u8,
            minor: (raw >> 16) as u8,
            build: (raw >> 8) as u8,
            revision: raw as u8,
        }
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.build, self.revision)
    }
}
