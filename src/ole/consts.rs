/// Magic bytes that should be at the beginning of every OLE file
pub const MAGIC: &[u8; 8] = crate::common::detection::OLE_MAGIC;

/// Minimal size of an empty OLE file with 512-byte sectors (1536 bytes)
pub const MINIMAL_OLEFILE_SIZE: usize = 1536;

/// Size of a directory entry in bytes
pub const DIRENTRY_SIZE: usize = 128;

/// Size of the compound file header in bytes
pub const HEADER_SIZE: usize = 512;

// Sector IDs (from AAF specifications)
/// End of a virtual stream chain
pub const ENDOFCHAIN: u32 = 0xFFFFFFFE; // -2
/// Unallocated sector
pub const FREESECT: u32 = 0xFFFFFFFF; // -1

/// Unallocated directory entry
pub const NOSTREAM: u32 = 0xFFFFFFFF; // -1

// Object types in storage (from AAF specifications)
/// Element is a storage object
pub const STGTY_STORAGE: u8 = 1;
/// Element is a stream object
pub const STGTY_STREAM: u8 = 2;
/// Element is a root storage
pub const STGTY_ROOT: u8 = 5;

/// Deepest storage nesting followed while walking the directory tree
pub const MAX_TREE_DEPTH: usize = 64;

// Property types
pub const VT_I2: u16 = 2;
pub const VT_I4: u16 = 3;
pub const VT_BSTR: u16 = 8;
pub const VT_ERROR: u16 = 10;
pub const VT_BOOL: u16 = 11;
pub const VT_UI2: u16 = 18;
pub const VT_UI4: u16 = 19;
pub const VT_INT: u16 = 22;
pub const VT_UINT: u16 = 23;
pub const VT_LPSTR: u16 = 30;
pub const VT_LPWSTR: u16 = 31;
pub const VT_FILETIME: u16 = 64;

/// Upper bound on properties read from one property set section
pub const MAX_PROPERTIES: u32 = 1000;

// HWP 5 stream names
/// File header stream (signature, version, flags)
pub const HWP_FILE_HEADER: &str = "FileHeader";
/// Storage holding one body stream per section
pub const HWP_BODY_TEXT: &str = "BodyText";
/// Storage holding body streams of distribution documents
pub const HWP_VIEW_TEXT: &str = "ViewText";
/// Storage holding embedded binary objects
pub const HWP_BIN_DATA: &str = "BinData";
/// UTF-16LE preview text stream
pub const HWP_PREVIEW_TEXT: &str = "PrvText";
/// Prefix of per-section body stream names
pub const HWP_SECTION_PREFIX: &str = "Section";

// Property set stream names
pub const HWP_SUMMARY_INFORMATION: &str = "\u{0005}HwpSummaryInformation";
pub const SUMMARY_INFORMATION: &str = "\u{0005}SummaryInformation";
pub const DOCUMENT_SUMMARY_INFORMATION: &str = "\u{0005}DocumentSummaryInformation";
