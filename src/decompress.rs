//! Ordered multi-codec decompression.
//!
//! A compressed payload is offered to each codec in turn. The first codec
//! that produces non-empty output within the output bound wins and later
//! codecs are never called. When every codec fails the original bytes are
//! returned unchanged together with a warning, so decompression on its own
//! never fails an analysis.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use tracing::{debug, warn};

/// A single decompression algorithm.
pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decode `input`, producing at most `limit` bytes.
    ///
    /// Returns `None` on malformed input, empty output or output that would
    /// exceed `limit`.
    fn decode(&self, input: &[u8], limit: u64) -> Option<Vec<u8>>;
}

fn drain<R: Read>(reader: R, limit: u64) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    // One extra byte distinguishes "exactly at the limit" from "over it"
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .ok()?;
    if out.is_empty() || out.len() as u64 > limit {
        return None;
    }
    Some(out)
}

/// Zlib-wrapped deflate (RFC 1950).
#[derive(Debug, Default, Clone, Copy)]
pub struct Zlib;

impl Codec for Zlib {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn decode(&self, input: &[u8], limit: u64) -> Option<Vec<u8>> {
        drain(ZlibDecoder::new(input), limit)
    }
}

/// Gzip-wrapped deflate (RFC 1952).
#[derive(Debug, Default, Clone, Copy)]
pub struct Gzip;

impl Codec for Gzip {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn decode(&self, input: &[u8], limit: u64) -> Option<Vec<u8>> {
        drain(GzDecoder::new(input), limit)
    }
}

/// Headerless deflate (RFC 1951), as used by HWP 5 body streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawDeflate;

impl Codec for RawDeflate {
    fn name(&self) -> &'static str {
        "raw-deflate"
    }

    fn decode(&self, input: &[u8], limit: u64) -> Option<Vec<u8>> {
        drain(DeflateDecoder::new(input), limit)
    }
}

/// Outcome of [`Decompressor::decompress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decompressed {
    pub data: Vec<u8>,
    /// Codec that produced `data`, `None` when the input was passed through
    pub codec: Option<&'static str>,
    pub warning: Option<String>,
}

/// Tries codecs in a fixed order.
pub struct Decompressor {
    codecs: Vec<Box<dyn Codec>>,
    max_output: u64,
}

impl std::fmt::Debug for Decompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decompressor")
            .field("codecs", &self.codec_names())
            .field("max_output", &self.max_output)
            .finish()
    }
}

impl Decompressor {
    /// Zlib, then gzip, then raw deflate.
    pub fn new(max_output: u64) -> Self {
        Self::with_codecs(
            vec![Box::new(Zlib), Box::new(Gzip), Box::new(RawDeflate)],
            max_output,
        )
    }

    pub fn with_codecs(codecs: Vec<Box<dyn Codec>>, max_output: u64) -> Self {
        Self { codecs, max_output }
    }

    pub fn codec_names(&self) -> Vec<&'static str> {
        self.codecs.iter().map(|c| c.name()).collect()
    }

    pub fn max_output(&self) -> u64 {
        self.max_output
    }

    /// Decompress `data` if the header says it is compressed.
    pub fn decompress(&self, data: &[u8], compressed: bool) -> Decompressed {
        if !compressed {
            return Decompressed {
                data: data.to_vec(),
                codec: None,
                warning: None,
            };
        }
        if let Some((codec, out)) = self.try_decode(data) {
            return Decompressed {
                data: out,
                codec: Some(codec),
                warning: None,
            };
        }
        warn!(len = data.len(), "no codec could decompress payload");
        Decompressed {
            data: data.to_vec(),
            codec: None,
            warning: Some(format!(
                "decompression failed with {}; using raw bytes",
                self.codec_names().join(", ")
            )),
        }
    }

    /// First codec output, or `None` if every codec fails.
    pub fn try_decode(&self, data: &[u8]) -> Option<(&'static str, Vec<u8>)> {
        for codec in &self.codecs {
            match codec.decode(data, self.max_output) {
                Some(out) => {
                    debug!(codec = codec.name(), input = data.len(), output = out.len(), "decoded");
                    return Some((codec.name(), out));
                },
                None => debug!(codec = codec.name(), "codec rejected input"),
            }
        }
        None
    }
}
