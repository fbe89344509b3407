/// Constants for OLE file format
pub mod consts;

/// Main OLE file parsing implementation
mod file;

/// Property set parsing for OLE metadata streams
mod metadata;

// Re-export public types for convenient access
pub use file::{DirectoryEntry, OleError, OleFile, StreamInfo};
pub use metadata::{PropertySet, PropertyValue, parse_property_stream, pid};
