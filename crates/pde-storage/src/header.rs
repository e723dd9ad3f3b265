use std::io::Cursor;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::StorageError;

pub const MAGIC: [u8; 8] = *b"PDESTORE";
pub const HEADER_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 48;

/// What an artifact holds; a reader asking for one kind never accepts another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ArtifactKind {
    ContainerSnapshot = 1,
}

impl ArtifactKind {
    fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            1 => Some(Self::ContainerSnapshot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    Zstd = 1,
}

/// Fixed-size little-endian artifact header.
///
/// Layout: magic (8), header version (4), kind (2), compression (1), reserved (1),
/// schema version (4), payload length (8), uncompressed length (8), content hash (8),
/// reserved (4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageHeader {
    pub kind: ArtifactKind,
    pub schema_version: u32,
    pub compression: Compression,
    /// Bytes on disk after the header.
    pub payload_len: u64,
    pub uncompressed_len: u64,
    /// First 8 bytes of the blake3 hash of the uncompressed payload.
    pub content_hash: u64,
}

impl StorageHeader {
    pub fn new(
        kind: ArtifactKind,
        schema_version: u32,
        compression: Compression,
        payload_len: u64,
        uncompressed_len: u64,
        content_hash: u64,
    ) -> Self {
        Self {
            kind,
            schema_version,
            compression,
            payload_len,
            uncompressed_len,
            content_hash,
        }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..8].copy_from_slice(&MAGIC);
        LittleEndian::write_u32(&mut out[8..12], HEADER_VERSION);
        LittleEndian::write_u16(&mut out[12..14], self.kind as u16);
        out[14] = self.compression as u8;
        LittleEndian::write_u32(&mut out[16..20], self.schema_version);
        LittleEndian::write_u64(&mut out[20..28], self.payload_len);
        LittleEndian::write_u64(&mut out[28..36], self.uncompressed_len);
        LittleEndian::write_u64(&mut out[36..44], self.content_hash);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        if bytes.len() < HEADER_LEN {
            return Err(StorageError::Truncated {
                expected: HEADER_LEN,
                found: bytes.len(),
            });
        }
        if bytes[..MAGIC.len()] != MAGIC {
            return Err(StorageError::InvalidHeader("bad magic"));
        }
        let mut cursor = Cursor::new(&bytes[MAGIC.len()..HEADER_LEN]);
        let header_version = cursor.read_u32::<LittleEndian>()?;
        if header_version != HEADER_VERSION {
            return Err(StorageError::InvalidHeader("unsupported header version"));
        }
        let kind = ArtifactKind::from_u16(cursor.read_u16::<LittleEndian>()?)
            .ok_or(StorageError::InvalidHeader("unknown artifact kind"))?;
        let compression = match cursor.read_u8()? {
            0 => Compression::None,
            1 => Compression::Zstd,
            other => return Err(StorageError::UnsupportedCompression(other)),
        };
        let _reserved = cursor.read_u8()?;
        Ok(Self {
            kind,
            compression,
            schema_version: cursor.read_u32::<LittleEndian>()?,
            payload_len: cursor.read_u64::<LittleEndian>()?,
            uncompressed_len: cursor.read_u64::<LittleEndian>()?,
            content_hash: cursor.read_u64::<LittleEndian>()?,
        })
    }
}
