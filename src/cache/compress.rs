//! Compressor Module
//!
//! Gzip-compresses serialized values above a size threshold. Compression
//! failures fall back to raw storage instead of failing the write.

use std::io::{Read, Write};

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use tracing::warn;

use crate::error::{CacheError, Result};

/// Default size above which payloads are compressed (1 KB).
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

// == Payload ==
/// Stored representation of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub compressed: bool,
}

impl Payload {
    pub fn raw(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            compressed: false,
        }
    }
}

// == Compressor ==
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    enabled: bool,
    threshold: usize,
}

impl Compressor {
    pub fn new(enabled: bool, threshold: usize) -> Self {
        Self { enabled, threshold }
    }

    // == Encode ==
    /// Turns serialized bytes into a storable payload.
    ///
    /// Payloads larger than the threshold are gzip-compressed when
    /// compression is enabled. On failure the raw bytes are kept.
    pub fn encode(&self, raw: Vec<u8>) -> Payload {
        if !self.enabled || raw.len() <= self.threshold {
            return Payload::raw(raw);
        }

        match gzip(&raw) {
            Ok(bytes) => Payload {
                bytes,
                compressed: true,
            },
            Err(err) => {
                warn!("Storing {} byte payload uncompressed: {}", raw.len(), err);
                Payload::raw(raw)
            }
        }
    }

    // == Decode ==
    /// Inverse of [`Compressor::encode`].
    ///
    /// Works on any payload regardless of the current `enabled` setting, so
    /// entries written before a config change stay readable.
    pub fn decode(bytes: &[u8], compressed: bool) -> Result<Vec<u8>> {
        if !compressed {
            return Ok(bytes.to_vec());
        }
        gunzip(bytes)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(true, DEFAULT_COMPRESSION_THRESHOLD)
    }
}

fn gzip(raw: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder
        .write_all(raw)
        .map_err(|e| CacheError::CompressionFailed(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| CacheError::CompressionFailed(e.to_string()))
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::with_capacity(bytes.len() * 2);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CacheError::CompressionFailed(e.to_string()))?;
    Ok(out)
}
