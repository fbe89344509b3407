//! Secure, bounded ingestion of untrusted files.
//!
//! The order of checks is fixed: access, size, header signature, header
//! screening, then the full read. Nothing beyond the header window is read
//! until every earlier check has passed, and the full read is capped both
//! in bytes and in time. File handles are owned by the functions below and
//! dropped on every return path.
//!
//! The suspicious-pattern screen is a heuristic over the header window
//! only. It catches obviously mislabelled executables and scripts; it is
//! not a security boundary and a clean result proves nothing.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use aho_corasick::AhoCorasick;
use bytes::{Bytes, BytesMut};
use once_cell::sync::Lazy;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::common::detection::{HEADER_WINDOW, has_known_signature};
use crate::common::error::{Error, FormatError, ResourceLimit, Result, SecurityViolation};
use crate::config::AnalyzeOptions;

/// Size of each read during the bounded body read.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Byte patterns that should never appear in a document header window.
pub const SUSPICIOUS_PATTERNS: &[&[u8]] = &[
    b"MZ\x90\x00",
    b"\x7FELF",
    b"#!/bin/",
    b"<script",
    b"javascript:",
    b"vbscript:",
    b"AutoOpen",
    b"AutoExec",
    b"Auto_Open",
    b"Document_Open",
    b"Workbook_Open",
    b"powershell",
];

static SCREEN: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(SUSPICIOUS_PATTERNS)
        .expect("suspicious pattern automaton")
});

/// Limits applied while ingesting one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestLimits {
    pub max_file_size: u64,
    pub max_memory_usage: u64,
    pub timeout: Duration,
}

impl From<&AnalyzeOptions> for IngestLimits {
    fn from(options: &AnalyzeOptions) -> Self {
        Self {
            max_file_size: options.max_file_size,
            max_memory_usage: options.max_memory_usage,
            timeout: options.timeout(),
        }
    }
}

/// Result of the header-only checks.
#[derive(Debug, Clone)]
pub struct HeaderProbe {
    pub path: PathBuf,
    /// File size reported by stat
    pub size: u64,
    /// First bytes of the file, at most [`HEADER_WINDOW`]
    pub header: Vec<u8>,
}

/// A fully read, validated file.
#[derive(Debug, Clone)]
pub struct IngestedFile {
    pub path: PathBuf,
    pub size: u64,
    pub header: Vec<u8>,
    pub data: Bytes,
    pub read_duration: Duration,
}

/// A file that passed every header-only check and is still open.
#[derive(Debug)]
pub struct ValidatedFile {
    file: File,
    probe: HeaderProbe,
}

impl ValidatedFile {
    pub fn probe(&self) -> &HeaderProbe {
        &self.probe
    }

    pub fn into_probe(self) -> HeaderProbe {
        self.probe
    }

    /// Read the remainder of the file under the memory ceiling and timeout.
    ///
    /// The handle is consumed and closed whatever the outcome.
    pub async fn read(self, limits: &IngestLimits) -> Result<IngestedFile> {
        let started = Instant::now();
        let Self { mut file, probe } = self;

        let capacity = probe.size.min(limits.max_memory_usage) as usize;
        let mut buffer = BytesMut::with_capacity(capacity);
        buffer.extend_from_slice(&probe.header);

        let read = read_bounded(&mut file, &mut buffer, limits.max_memory_usage);
        match tokio::time::timeout(limits.timeout, read).await {
            Ok(result) => result?,
            Err(_) => {
                debug!(path = %probe.path.display(), timeout = ?limits.timeout, "read timed out");
                return Err(ResourceLimit::ReadTimeout(limits.timeout).into());
            },
        }
        drop(file);

        let read_duration = started.elapsed();
        debug!(
            path = %probe.path.display(),
            bytes = buffer.len(),
            elapsed = ?read_duration,
            "file ingested"
        );

        Ok(IngestedFile {
            path: probe.path,
            size: probe.size,
            header: probe.header,
            data: buffer.freeze(),
            read_duration,
        })
    }
}

/// Run the access, size, signature and screening checks, keeping the
/// handle open for the body read.
pub async fn validate(path: &Path, limits: &IngestLimits) -> Result<ValidatedFile> {
    let (file, probe) = open_checked(path, limits).await?;
    Ok(ValidatedFile { file, probe })
}

/// Run the header-only checks and close the file.
pub async fn probe(path: &Path, limits: &IngestLimits) -> Result<HeaderProbe> {
    Ok(validate(path, limits).await?.into_probe())
}

/// Validate and fully read a file under the configured limits.
pub async fn ingest(path: &Path, limits: &IngestLimits) -> Result<IngestedFile> {
    validate(path, limits).await?.read(limits).await
}

/// Scan a header window against [`SUSPICIOUS_PATTERNS`].
pub fn screen_header(header: &[u8]) -> std::result::Result<(), SecurityViolation> {
    match SCREEN.find(header) {
        Some(found) => Err(SecurityViolation::MaliciousPatternDetected {
            pattern: String::from_utf8_lossy(SUSPICIOUS_PATTERNS[found.pattern().as_usize()])
                .into_owned(),
        }),
        None => Ok(()),
    }
}

async fn open_checked(path: &Path, limits: &IngestLimits) -> Result<(File, HeaderProbe)> {
    // (a) access
    let mut file = File::open(path).await.map_err(|e| open_error(path, e))?;

    // (b) stat
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(Error::unclassified(path, "validate", "not a regular file"));
    }
    let size = metadata.len();
    if size > limits.max_file_size {
        return Err(ResourceLimit::FileTooLarge {
            size,
            limit: limits.max_file_size,
        }
        .into());
    }
    if size == 0 {
        return Err(FormatError::EmptyFile.into());
    }

    // (c) signature
    let window = size.min(HEADER_WINDOW as u64) as usize;
    let mut header = vec![0u8; window];
    let mut filled = 0;
    while filled < window {
        let n = file.read(&mut header[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    header.truncate(filled);
    if !has_known_signature(&header) {
        return Err(FormatError::InvalidSignature.into());
    }

    // (d) heuristic screen
    screen_header(&header)?;

    Ok((
        file,
        HeaderProbe {
            path: path.to_path_buf(),
            size,
            header,
        },
    ))
}

fn open_error(path: &Path, err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => SecurityViolation::PermissionDenied.into(),
        std::io::ErrorKind::NotFound => FormatError::NotFound.into(),
        _ => Error::unclassified(path, "validate", err),
    }
}

/// (e) Accumulate the rest of the file, refusing to grow past `ceiling`.
async fn read_bounded(file: &mut File, buffer: &mut BytesMut, ceiling: u64) -> Result<()> {
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = file.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        let used = (buffer.len() + n) as u64;
        if used > ceiling {
            return Err(ResourceLimit::MemoryLimitExceeded {
                used,
                limit: ceiling,
            }
            .into());
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;
    use std::io::Write;

    fn limits() -> IngestLimits {
        IngestLimits {
            max_file_size: 1024 * 1024,
            max_memory_usage: 1024 * 1024,
            timeout: Duration::from_secs(5),
        }
    }

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn hwp_bytes(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[..17].copy_from_slice(b"HWP Document File");
        data
    }

    #[tokio::test]
    async fn test_ingest_reads_whole_file() {
        let file = write_temp(&hwp_bytes(200_000));
        let ingested = ingest(file.path(), &limits()).await.unwrap();
        assert_eq!(ingested.data.len(), 200_000);
        assert_eq!(ingested.header.len(), HEADER_WINDOW);
        assert_eq!(ingested.size, 200_000);
    }

    #[tokio::test]
    async fn test_empty_file() {
        let file = write_temp(b"");
        let err = ingest(file.path(), &limits()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::EmptyFile);
    }

    #[tokio::test]
    async fn test_file_too_large() {
        let file = write_temp(&hwp_bytes(4096));
        let mut limits = limits();
        limits.max_file_size = 1000;
        let err = ingest(file.path(), &limits).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::FileSizeExceeded);
    }

    #[tokio::test]
    async fn test_invalid_signature() {
        let file = write_temp(b"\x01\x02\x03\x04 random payload");
        let err = probe(file.path(), &limits()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidSignature);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = probe(Path::new("/definitely/not/here.hwp"), &limits())
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::FileNotFound);
    }

    #[tokio::test]
    async fn test_memory_ceiling() {
        let file = write_temp(&hwp_bytes(300_000));
        let mut limits = limits();
        limits.max_memory_usage = 100_000;
        let err = ingest(file.path(), &limits).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MemoryLimitExceeded);
    }

    #[tokio::test]
    async fn test_suspicious_header() {
        let mut data = hwp_bytes(1024);
        data[100..114].copy_from_slice(b"javascript:foo");
        let file = write_temp(&data);
        let err = probe(file.path(), &limits()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MaliciousPatternDetected);
    }

    #[test]
    fn test_screen_is_case_insensitive() {
        assert!(screen_header(b"....AUTOOPEN....").is_err());
        assert!(screen_header(b"HWP Document File").is_ok());
    }
}
