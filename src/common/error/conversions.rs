//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from internal
//! error types to the unified Error type.

use super::types::{Error, FormatError};

impl From<crate::ole::OleError> for Error {
    fn from(err: crate::ole::OleError) -> Self {
        match err {
            crate::ole::OleError::Io(e) => Error::Io(e),
            crate::ole::OleError::NotOleFile => Error::Format(FormatError::InvalidSignature),
            crate::ole::OleError::StreamNotFound => Error::Format(FormatError::NotFound),
            crate::ole::OleError::InvalidFormat(s)
            | crate::ole::OleError::InvalidData(s)
            | crate::ole::OleError::CorruptedFile(s) => Error::Format(FormatError::CorruptContainer(s)),
        }
    }
}

impl From<crate::common::binary::BinaryError> for Error {
    fn from(err: crate::common::binary::BinaryError) -> Self {
        Error::Format(FormatError::UnparseableRecord(err.to_string()))
    }
}

#[cfg(feature = "ooxml")]
impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => Error::Io(e),
            zip::result::ZipError::FileNotFound => Error::Format(FormatError::NotFound),
            other => Error::Format(FormatError::CorruptContainer(other.to_string())),
        }
    }
}

#[cfg(feature = "ooxml")]
impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Format(FormatError::CorruptContainer(format!("XML error: {}", err)))
    }
}
