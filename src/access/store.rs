//! Backing stores a manager pages regions against.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

use dashmap::DashMap;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::RegionKey;

use super::region::RegionBuffer;

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupted region data: {0}")]
    Corrupted(String),

    #[error("region format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

impl From<bincode::Error> for PersistenceError {
    fn from(err: bincode::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

/// Durable medium for region buffers, keyed by grid position.
///
/// `read` returning `Ok(None)` means the region was never written; the
/// manager treats it as an all-empty region rather than an error.
pub trait AccessFormat: Send + Sync {
    fn read(&self, key: RegionKey) -> PersistenceResult<Option<RegionBuffer>>;
    fn write(&self, key: RegionKey, buffer: &RegionBuffer) -> PersistenceResult<()>;
}

/// In-memory store for tests and assembly scratch maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    regions: DashMap<RegionKey, RegionBuffer>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl AccessFormat for MemoryStore {
    fn read(&self, key: RegionKey) -> PersistenceResult<Option<RegionBuffer>> {
        Ok(self.regions.get(&key).map(|entry| entry.value().clone()))
    }

    fn write(&self, key: RegionKey, buffer: &RegionBuffer) -> PersistenceResult<()> {
        self.regions.insert(key, buffer.clone());
        Ok(())
    }
}

const REGION_MAGIC: [u8; 4] = *b"DMRG";
const REGION_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RegionFileHeader {
    magic: [u8; 4],
    version: u32,
    key: RegionKey,
    payload_len: u32,
    checksum: u32,
}

impl RegionFileHeader {
    fn encoded_len() -> PersistenceResult<usize> {
        let probe = RegionFileHeader {
            magic: REGION_MAGIC,
            version: 0,
            key: RegionKey::new(0, 0),
            payload_len: 0,
            checksum: 0,
        };
        Ok(bincode::serialized_size(&probe)? as usize)
    }
}

/// One file per region under a root directory. The payload is a
/// bincode-encoded buffer, zlib-compressed, behind a header carrying magic
/// bytes, format version and a crc32 of the compressed payload. Writes go
/// through a temp file and rename, so a failed write never clobbers an
/// existing region.
pub struct DirectoryStore {
    root: PathBuf,
    level: Compression,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> PersistenceResult<Self> {
        Self::with_compression(root, Compression::default())
    }

    pub fn with_compression(
        root: impl Into<PathBuf>,
        level: Compression,
    ) -> PersistenceResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, level })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn region_path(&self, key: RegionKey) -> PathBuf {
        self.root.join(format!("region_{}_{}.dmr", key.x, key.y))
    }

    fn encode(&self, key: RegionKey, buffer: &RegionBuffer) -> PersistenceResult<Vec<u8>> {
        let raw = bincode::serialize(buffer)?;
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(&raw)?;
        let payload = encoder.finish()?;
        let header = RegionFileHeader {
            magic: REGION_MAGIC,
            version: REGION_FORMAT_VERSION,
            key,
            payload_len: payload.len() as u32,
            checksum: crc32fast::hash(&payload),
        };
        let mut out = bincode::serialize(&header)?;
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn decode(&self, key: RegionKey, data: &[u8]) -> PersistenceResult<RegionBuffer> {
        let header_len = RegionFileHeader::encoded_len()?;
        if data.len() < header_len {
            return Err(PersistenceError::Corrupted(format!(
                "file is {} bytes, shorter than the {header_len}-byte header",
                data.len()
            )));
        }
        let header: RegionFileHeader = bincode::deserialize(&data[..header_len])?;
        if header.magic != REGION_MAGIC {
            return Err(PersistenceError::Corrupted("bad magic bytes".into()));
        }
        if header.version != REGION_FORMAT_VERSION {
            return Err(PersistenceError::VersionMismatch {
                expected: REGION_FORMAT_VERSION,
                found: header.version,
            });
        }
        if header.key != key {
            return Err(PersistenceError::Corrupted(format!(
                "file claims region ({}, {}), expected ({}, {})",
                header.key.x, header.key.y, key.x, key.y
            )));
        }
        let payload = &data[header_len..];
        if payload.len() != header.payload_len as usize {
            return Err(PersistenceError::Corrupted(format!(
                "payload is {} bytes, header says {}",
                payload.len(),
                header.payload_len
            )));
        }
        if crc32fast::hash(payload) != header.checksum {
            return Err(PersistenceError::Corrupted("checksum mismatch".into()));
        }
        let mut raw = Vec::new();
        ZlibDecoder::new(payload).read_to_end(&mut raw)?;
        Ok(bincode::deserialize(&raw)?)
    }
}

impl AccessFormat for DirectoryStore {
    fn read(&self, key: RegionKey) -> PersistenceResult<Option<RegionBuffer>> {
        let path = self.region_path(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        self.decode(key, &data).map(Some)
    }

    fn write(&self, key: RegionKey, buffer: &RegionBuffer) -> PersistenceResult<()> {
        let data = self.encode(key, buffer)?;
        let path = self.region_path(key);
        let tmp = path.with_extension("dmr.tmp");
        fs::write(&tmp, &data)?;
        fs::rename(&tmp, &path)?;
        log::trace!(
            "wrote region ({}, {}) as {} bytes",
            key.x,
            key.y,
            data.len()
        );
        Ok(())
    }
}
