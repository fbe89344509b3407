//! Unified error types for hwpscan.
//!
//! Errors are grouped the way the pipeline treats them: security violations
//! and resource limits abort an analysis, format errors are recovered where
//! a later stage can still run, and strategy failures only ever become
//! warnings.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for hwpscan operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Access or content screening refused the file
    #[error("Security violation: {0}")]
    Security(#[from] SecurityViolation),

    /// A configured size, memory or time ceiling was crossed
    #[error("Resource limit: {0}")]
    Resource(#[from] ResourceLimit),

    /// The bytes do not look like a document we can read
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// One extraction strategy gave up
    #[error("Strategy '{strategy}' failed: {reason}")]
    Strategy { strategy: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else, with the context it happened in
    #[error("{stage} failed for {}: {source}", .path.display())]
    Unclassified {
        path: PathBuf,
        stage: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Reasons a file is refused before any parsing happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityViolation {
    #[error("permission denied")]
    PermissionDenied,

    /// Heuristic screen only: absence of a match proves nothing.
    #[error("suspicious pattern '{pattern}' in header window")]
    MaliciousPatternDetected { pattern: String },
}

/// Ceilings enforced while reading and extracting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceLimit {
    #[error("file is {size} bytes, limit is {limit}")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("read buffer reached {used} bytes, limit is {limit}")]
    MemoryLimitExceeded { used: u64, limit: u64 },

    #[error("process memory reached {used} bytes, limit is {limit}")]
    ProcessMemoryExceeded { used: u64, limit: u64 },

    #[error("read did not finish within {0:?}")]
    ReadTimeout(Duration),

    #[error("strategy '{strategy}' did not finish within {timeout:?}")]
    StrategyTimeout { strategy: String, timeout: Duration },

    /// The whole analysis ran past its deadline.
    #[error("analysis did not finish within {0:?}")]
    OperationTimeout(Duration),
}

/// Structural problems with the input bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("file is empty")]
    EmptyFile,

    #[error("unrecognized file signature")]
    InvalidSignature,

    #[error("corrupt container: {0}")]
    CorruptContainer(String),

    #[error("unparseable record: {0}")]
    UnparseableRecord(String),

    #[error("file not found")]
    NotFound,
}

/// Stable, serializable error codes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    PermissionDenied,
    MaliciousPatternDetected,
    FileSizeExceeded,
    MemoryLimitExceeded,
    ReadTimeout,
    StrategyTimeout,
    OperationTimeout,
    EmptyFile,
    InvalidSignature,
    CorruptContainer,
    UnparseableRecord,
    FileNotFound,
    StrategyFailure,
    Unclassified,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::MaliciousPatternDetected => "MALICIOUS_PATTERN_DETECTED",
            ErrorCode::FileSizeExceeded => "FILE_SIZE_EXCEEDED",
            ErrorCode::MemoryLimitExceeded => "MEMORY_LIMIT_EXCEEDED",
            ErrorCode::ReadTimeout => "READ_TIMEOUT",
            ErrorCode::StrategyTimeout => "STRATEGY_TIMEOUT",
            ErrorCode::OperationTimeout => "OPERATION_TIMEOUT",
            ErrorCode::EmptyFile => "EMPTY_FILE",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::CorruptContainer => "CORRUPT_CONTAINER",
            ErrorCode::UnparseableRecord => "UNPARSEABLE_RECORD",
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::StrategyFailure => "STRATEGY_FAILURE",
            ErrorCode::Unclassified => "UNCLASSIFIED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Build a strategy failure.
    pub fn strategy(strategy: impl Into<String>, reason: impl ToString) -> Self {
        Error::Strategy {
            strategy: strategy.into(),
            reason: reason.to_string(),
        }
    }

    /// Wrap an arbitrary error with the path and stage it surfaced in.
    pub fn unclassified<E>(path: impl Into<PathBuf>, stage: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Unclassified {
            path: path.into(),
            stage,
            source: source.into(),
        }
    }

    /// The error code reported at the public boundary.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Security(SecurityViolation::PermissionDenied) => ErrorCode::PermissionDenied,
            Error::Security(SecurityViolation::MaliciousPatternDetected { .. }) => {
                ErrorCode::MaliciousPatternDetected
            },
            Error::Resource(ResourceLimit::FileTooLarge { .. }) => ErrorCode::FileSizeExceeded,
            Error::Resource(
                ResourceLimit::MemoryLimitExceeded { .. } | ResourceLimit::ProcessMemoryExceeded { .. },
            ) => ErrorCode::MemoryLimitExceeded,
            Error::Resource(ResourceLimit::ReadTimeout(_)) => ErrorCode::ReadTimeout,
            Error::Resource(ResourceLimit::StrategyTimeout { .. }) => ErrorCode::StrategyTimeout,
            Error::Resource(ResourceLimit::OperationTimeout(_)) => ErrorCode::OperationTimeout,
            Error::Format(FormatError::EmptyFile) => ErrorCode::EmptyFile,
            Error::Format(FormatError::InvalidSignature) => ErrorCode::InvalidSignature,
            Error::Format(FormatError::CorruptContainer(_)) => ErrorCode::CorruptContainer,
            Error::Format(FormatError::UnparseableRecord(_)) => ErrorCode::UnparseableRecord,
            Error::Format(FormatError::NotFound) => ErrorCode::FileNotFound,
            Error::Strategy { .. } => ErrorCode::StrategyFailure,
            Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            Error::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                ErrorCode::PermissionDenied
            },
            Error::Io(_) | Error::Unclassified { .. } => ErrorCode::Unclassified,
        }
    }

    /// Whether this error aborts the whole analysis rather than one stage.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Security(_) | Error::Resource(_))
    }
}

/// Result type for hwpscan operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = Error::from(ResourceLimit::FileTooLarge { size: 10, limit: 5 });
        assert_eq!(err.code(), ErrorCode::FileSizeExceeded);
        assert!(err.is_fatal());

        let err = Error::from(FormatError::EmptyFile);
        assert_eq!(err.code(), ErrorCode::EmptyFile);
        assert!(!err.is_fatal());

        let err = Error::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(err.code(), ErrorCode::FileNotFound);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::FileSizeExceeded).unwrap();
        assert_eq!(json, "\"FILE_SIZE_EXCEEDED\"");
        assert_eq!(ErrorCode::InvalidSignature.as_str(), "INVALID_SIGNATURE");
    }

    #[test]
    fn test_unclassified_keeps_context() {
        let err = Error::unclassified("/tmp/a.hwp", "metadata", "boom");
        let message = err.to_string();
        assert!(message.contains("metadata"));
        assert!(message.contains("/tmp/a.hwp"));
        assert_eq!(err.code(), ErrorCode::Unclassified);
    }
}
