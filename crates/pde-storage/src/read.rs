use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::header::{ArtifactKind, Compression, StorageHeader, HEADER_LEN};
use crate::StorageError;

/// Reads the header of the artifact at `path` without touching the payload.
pub fn read_header(path: &Path) -> Result<Option<StorageHeader>, StorageError> {
    let mut file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut bytes = Vec::with_capacity(HEADER_LEN);
    file.by_ref().take(HEADER_LEN as u64).read_to_end(&mut bytes)?;
    StorageHeader::decode(&bytes).map(Some)
}

/// Reads and validates the artifact at `path`.
///
/// A missing file is `Ok(None)`. Anything else that is not a well-formed artifact of `kind` at
/// `schema_version` is an error.
pub fn read_artifact<T>(
    path: &Path,
    kind: ArtifactKind,
    schema_version: u32,
) -> Result<Option<T>, StorageError>
where
    T: DeserializeOwned,
{
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let header = StorageHeader::decode(&bytes)?;
    if header.kind != kind {
        return Err(StorageError::WrongArtifact {
            expected: kind,
            found: header.kind,
        });
    }
    if header.schema_version != schema_version {
        return Err(StorageError::WrongSchema {
            expected: schema_version,
            found: header.schema_version,
        });
    }

    let payload_len = usize::try_from(header.payload_len).map_err(|_| {
        StorageError::OversizedPayload {
            payload_len: header.payload_len,
        }
    })?;
    let expected = HEADER_LEN.saturating_add(payload_len);
    if bytes.len() < expected {
        return Err(StorageError::Truncated {
            expected,
            found: bytes.len(),
        });
    }
    let payload = &bytes[HEADER_LEN..expected];

    let decoded = match header.compression {
        Compression::None => payload.to_vec(),
        Compression::Zstd => {
            let capacity = usize::try_from(header.uncompressed_len).unwrap_or(0);
            zstd::bulk::decompress(payload, capacity)
                .map_err(|e| StorageError::Compression(e.to_string()))?
        }
    };
    if decoded.len() as u64 != header.uncompressed_len {
        return Err(StorageError::InvalidHeader("uncompressed length mismatch"));
    }

    let found = crate::content_hash(&decoded);
    if found != header.content_hash {
        return Err(StorageError::HashMismatch {
            expected: header.content_hash,
            found,
        });
    }

    Ok(Some(bincode::deserialize(&decoded)?))
}

/// [`read_artifact`], treating every failure as a miss and deleting the offending file.
pub fn read_artifact_or_discard<T>(path: &Path, kind: ArtifactKind, schema_version: u32) -> Option<T>
where
    T: DeserializeOwned,
{
    match read_artifact(path, kind, schema_version) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(
                target = "pde.storage",
                path = %path.display(),
                error = %err,
                "discarding unreadable artifact"
            );
            let _ = fs::remove_file(path);
            None
        }
    }
}
