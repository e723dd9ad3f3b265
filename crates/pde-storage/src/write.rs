use std::fs;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::header::{ArtifactKind, Compression, StorageHeader, HEADER_LEN};
use crate::StorageError;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteCompression {
    #[default]
    None,
    Zstd { level: i32 },
    /// zstd (default level) once the encoded payload reaches `threshold` bytes.
    Auto { threshold: u64 },
}

/// Encodes `value` and atomically replaces `path` with the resulting artifact.
///
/// The artifact is written to a unique sibling temp file first and renamed into place, so
/// readers see either the old file or the complete new one.
pub fn write_artifact_atomic<T>(
    path: &Path,
    kind: ArtifactKind,
    schema_version: u32,
    value: &T,
    compression: WriteCompression,
) -> Result<(), StorageError>
where
    T: Serialize,
{
    let parent = path
        .parent()
        .ok_or(StorageError::InvalidHeader("missing parent directory"))?;
    fs::create_dir_all(parent)?;

    let encoded = bincode::serialize(value)?;
    let uncompressed_len = encoded.len() as u64;

    let (compression, zstd_level) = match compression {
        WriteCompression::None => (Compression::None, 0),
        WriteCompression::Zstd { level } => (Compression::Zstd, level),
        WriteCompression::Auto { threshold } if uncompressed_len >= threshold => {
            (Compression::Zstd, 0)
        }
        WriteCompression::Auto { .. } => (Compression::None, 0),
    };

    let content_hash = crate::content_hash(&encoded);
    let (tmp_path, file) = open_unique_tmp_file(path, parent)?;

    let result = (|| -> Result<(), StorageError> {
        let (mut file, payload_len) = write_payload(file, &encoded, compression, zstd_level)?;
        let header = StorageHeader::new(
            kind,
            schema_version,
            compression,
            payload_len,
            uncompressed_len,
            content_hash,
        );

        // Overwrite the placeholder header now that the payload length is known.
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header.encode())?;
        file.sync_all()?;
        drop(file);

        rename_overwrite(&tmp_path, path).map_err(StorageError::from)
    })();

    if let Err(err) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    tracing::trace!(
        target = "pde.storage",
        path = %path.display(),
        kind = ?kind,
        bytes = uncompressed_len,
        "artifact written"
    );
    Ok(())
}

fn write_payload(
    mut file: fs::File,
    payload: &[u8],
    compression: Compression,
    zstd_level: i32,
) -> Result<(fs::File, u64), StorageError> {
    file.write_all(&[0u8; HEADER_LEN])?;

    match compression {
        Compression::None => {
            file.write_all(payload)?;
            Ok((file, payload.len() as u64))
        }
        Compression::Zstd => {
            let mut encoder = zstd::stream::write::Encoder::new(file, zstd_level)
                .map_err(|e| StorageError::Compression(e.to_string()))?;
            encoder.write_all(payload)?;
            let mut file = encoder
                .finish()
                .map_err(|e| StorageError::Compression(e.to_string()))?;
            let end = file.seek(SeekFrom::End(0))?;
            let payload_len = end
                .checked_sub(HEADER_LEN as u64)
                .ok_or(StorageError::InvalidHeader("payload length underflow"))?;
            Ok((file, payload_len))
        }
    }
}

fn rename_overwrite(tmp_path: &Path, dest: &Path) -> io::Result<()> {
    const MAX_RENAME_ATTEMPTS: usize = 64;
    let mut attempts = 0usize;

    loop {
        match fs::rename(tmp_path, dest) {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists || dest.exists() => {
                // Some platforms refuse to rename over an existing file.
                let _ = fs::remove_file(dest);

                attempts += 1;
                if attempts >= MAX_RENAME_ATTEMPTS {
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        }
    }
}

fn open_unique_tmp_file(dest: &Path, parent: &Path) -> io::Result<(PathBuf, fs::File)> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::other("destination path has no file name"))?;
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(format!(".tmp.{pid}.{counter}"));
        let tmp_path = parent.join(tmp_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
}
