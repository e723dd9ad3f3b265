//! Small versioned binary artifacts on disk.
//!
//! ## Format
//! Each artifact is stored as:
//! - a fixed-size header (48 bytes, little-endian), see [`StorageHeader`]
//! - a `bincode` payload, optionally compressed with zstd as a whole
//!
//! The header carries the artifact kind and a caller-chosen schema version. Readers reject any
//! mismatch, and a blake3 content hash of the uncompressed payload catches corruption. Writes
//! are atomic (temp file + rename).

mod header;
mod read;
mod write;

pub use header::{ArtifactKind, Compression, StorageHeader, HEADER_LEN, MAGIC};
pub use read::{read_artifact, read_artifact_or_discard, read_header};
pub use write::{write_artifact_atomic, WriteCompression};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),
    #[error("incompatible artifact kind: expected {expected:?}, found {found:?}")]
    WrongArtifact {
        expected: ArtifactKind,
        found: ArtifactKind,
    },
    #[error("incompatible schema version: expected {expected}, found {found}")]
    WrongSchema { expected: u32, found: u32 },
    #[error("truncated file: expected at least {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("payload encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("compression failed: {0}")]
    Compression(String),
    #[error("unsupported compression tag {0}")]
    UnsupportedCompression(u8),
    #[error("payload size {payload_len} does not fit into addressable memory")]
    OversizedPayload { payload_len: u64 },
    #[error("payload hash mismatch: expected {expected}, found {found}")]
    HashMismatch { expected: u64, found: u64 },
}

fn content_hash(payload: &[u8]) -> u64 {
    let hash = blake3::hash(payload);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}
