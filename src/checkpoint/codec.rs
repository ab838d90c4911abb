//! State codec: `LearnerState` <-> bytes.
//!
//! State is encoded as JSON, optionally wrapped in a gzip stream. Decoding
//! infers compression from the gzip magic bytes, so no flag has to travel with
//! the blob.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::error::Category;

use crate::error::CheckpointError;
use crate::models::LearnerState;

/// First two bytes of every gzip member.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Encode a state, gzip-compressed when `compress` is set.
pub fn encode(state: &LearnerState, compress: bool) -> Result<Vec<u8>, CheckpointError> {
    let json = serde_json::to_vec(state)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    if !compress {
        return Ok(json);
    }

    let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 2), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Whether a blob is gzip-compressed.
pub fn is_compressed(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Decode a blob produced by [`encode`].
///
/// Empty, truncated or otherwise undecodable bytes are `CorruptCheckpoint`.
/// Well-formed JSON of the wrong shape is `SchemaMismatch`.
pub fn decode(name: &str, bytes: &[u8]) -> Result<LearnerState, CheckpointError> {
    let corrupt = |reason: String| CheckpointError::CorruptCheckpoint {
        name: name.to_string(),
        reason,
    };

    if bytes.is_empty() {
        return Err(corrupt("empty checkpoint".to_string()));
    }

    let decompressed;
    let json: &[u8] = if is_compressed(bytes) {
        let mut buffer = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut buffer)
            .map_err(|e| corrupt(format!("gzip stream unreadable: {}", e)))?;
        decompressed = buffer;
        &decompressed
    } else {
        bytes
    };

    serde_json::from_slice(json).map_err(|e| match e.classify() {
        Category::Data => CheckpointError::SchemaMismatch {
            expected: "learner state".to_string(),
            found: e.to_string(),
        },
        Category::Io | Category::Syntax | Category::Eof => corrupt(e.to_string()),
    })
}
