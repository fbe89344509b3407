//! File format detection utilities.
//!
//! Classification is based on fixed-offset signatures (magic numbers) in the
//! header window, reading nothing beyond it.

// Submodule declarations
pub mod functions;
pub mod types;

// Re-exports
pub use functions::{
    FILE_HEADER_LEN, FLAGS_OFFSET, FileSignatureInfo, HEADER_WINDOW, HWP_MAGIC, OLE_MAGIC,
    VERSION_OFFSET, ZIP_MAGIC, has_known_signature, parse_file_header,
};
pub use types::{ContainerFlavor, DocumentKind, FormatVersion, HeaderFlags};
