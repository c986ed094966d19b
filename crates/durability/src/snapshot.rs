//! Store snapshots
//!
//! ## File Layout
//!
//! ```text
//! +--------+---------+-------------+---------+------------------+
//! | "DKVS" | version | payload len |  CRC32  | bincode payload  |
//! | 4 B    | u16 LE  | u64 LE      | u32 LE  | payload len B    |
//! +--------+---------+-------------+---------+------------------+
//! ```
//!
//! Snapshots live at `<data_dir>/<bundle>/<store_id>.dkv`. A snapshot is
//! written to `<store_id>.dkv.tmp` and renamed over the old file, so a
//! reader sees either the previous or the new snapshot.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use distkv_core::{Error, Options};
use distkv_storage::{Partition, StoredValue};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Magic bytes at the start of every snapshot
pub const SNAPSHOT_MAGIC: &[u8; 4] = b"DKVS";

/// Current snapshot format version
pub const SNAPSHOT_FORMAT_VERSION: u16 = 1;

/// File extension of snapshot files
pub const SNAPSHOT_EXTENSION: &str = "dkv";

const HEADER_LEN: usize = 4 + 2 + 8 + 4;

/// Snapshot errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File does not start with the snapshot magic
    #[error("not a snapshot file: bad magic")]
    BadMagic,

    /// Written by a newer format
    #[error("unsupported snapshot format version {0}")]
    UnsupportedVersion(u16),

    /// Payload shorter than the header claims
    #[error("truncated snapshot: expected {expected} payload bytes, found {found}")]
    Truncated {
        /// Length from the header
        expected: u64,
        /// Bytes actually present
        found: u64,
    },

    /// Payload checksum mismatch
    #[error("checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum from the header
        expected: u32,
        /// Checksum of the payload read
        computed: u32,
    },

    /// Payload could not be encoded or decoded
    #[error("snapshot payload error: {0}")]
    Payload(String),
}

impl From<SnapshotError> for Error {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::Io(io) => Error::Io(io),
            other => Error::Storage(other.to_string()),
        }
    }
}

/// Fixed-size header of a snapshot file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Format version
    pub format_version: u16,
    /// Payload length in bytes
    pub payload_len: u64,
    /// CRC32 of the payload
    pub checksum: u32,
}

impl SnapshotHeader {
    fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let mut cursor = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if &magic != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        let format_version = cursor.read_u16::<LittleEndian>()?;
        if format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(format_version));
        }
        let payload_len = cursor.read_u64::<LittleEndian>()?;
        let checksum = cursor.read_u32::<LittleEndian>()?;
        Ok(SnapshotHeader {
            format_version,
            payload_len,
            checksum,
        })
    }

    fn encode(&self, out: &mut Vec<u8>) -> Result<(), SnapshotError> {
        out.write_all(SNAPSHOT_MAGIC)?;
        out.write_u16::<LittleEndian>(self.format_version)?;
        out.write_u64::<LittleEndian>(self.payload_len)?;
        out.write_u32::<LittleEndian>(self.checksum)?;
        Ok(())
    }
}

/// Everything persisted for one store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Store id
    pub store_id: String,
    /// Options the store was created with
    pub options: Options,
    /// Store version at snapshot time
    pub version: u64,
    /// All entries, by partition
    pub entries: Vec<(Partition, String, StoredValue)>,
}

/// Writes snapshot files
pub struct SnapshotWriter;

impl SnapshotWriter {
    /// Encode a snapshot into bytes
    pub fn encode(data: &SnapshotData) -> Result<Vec<u8>, SnapshotError> {
        let payload =
            bincode::serialize(data).map_err(|e| SnapshotError::Payload(e.to_string()))?;
        let header = SnapshotHeader {
            format_version: SNAPSHOT_FORMAT_VERSION,
            payload_len: payload.len() as u64,
            checksum: crc32fast::hash(&payload),
        };
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        header.encode(&mut out)?;
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Write a snapshot to `path`, replacing any previous file atomically.
    pub fn write(path: &Path, data: &SnapshotData) -> Result<(), SnapshotError> {
        let bytes = Self::encode(data)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension(format!("{}.tmp", SNAPSHOT_EXTENSION));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        debug!(
            path = %path.display(),
            entries = data.entries.len(),
            bytes = bytes.len(),
            "snapshot written"
        );
        Ok(())
    }
}

/// Reads snapshot files
pub struct SnapshotReader;

impl SnapshotReader {
    /// Decode a snapshot from bytes, validating header and checksum
    pub fn decode(bytes: &[u8]) -> Result<SnapshotData, SnapshotError> {
        if bytes.len() < HEADER_LEN {
            return Err(SnapshotError::Truncated {
                expected: HEADER_LEN as u64,
                found: bytes.len() as u64,
            });
        }
        let header = SnapshotHeader::decode(&bytes[..HEADER_LEN])?;
        let payload = &bytes[HEADER_LEN..];
        if (payload.len() as u64) < header.payload_len {
            return Err(SnapshotError::Truncated {
                expected: header.payload_len,
                found: payload.len() as u64,
            });
        }
        let payload = &payload[..header.payload_len as usize];
        let computed = crc32fast::hash(payload);
        if computed != header.checksum {
            return Err(SnapshotError::ChecksumMismatch {
                expected: header.checksum,
                computed,
            });
        }
        bincode::deserialize(payload).map_err(|e| SnapshotError::Payload(e.to_string()))
    }

    /// Read only the header of a snapshot file
    pub fn read_header(path: &Path) -> Result<SnapshotHeader, SnapshotError> {
        let mut file = File::open(path)?;
        let mut buf = [0u8; HEADER_LEN];
        file.read_exact(&mut buf)?;
        SnapshotHeader::decode(&buf)
    }

    /// Read a snapshot file. A missing file is `Ok(None)`.
    pub fn read(path: &Path) -> Result<Option<SnapshotData>, SnapshotError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match Self::decode(&bytes) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "snapshot is unreadable");
                Err(e)
            }
        }
    }
}

/// Locating snapshot files
pub struct SnapshotDiscovery;

impl SnapshotDiscovery {
    /// Path of the snapshot for a store
    pub fn store_path(data_dir: &Path, bundle: &str, store_id: &str) -> PathBuf {
        data_dir
            .join(bundle)
            .join(format!("{}.{}", store_id, SNAPSHOT_EXTENSION))
    }

    /// Ids of all stores with a snapshot under `<data_dir>/<bundle>`, sorted
    pub fn list_store_ids(data_dir: &Path, bundle: &str) -> Result<Vec<String>, SnapshotError> {
        let dir = data_dir.join(bundle);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove a store's snapshot. Returns true if a file was removed.
    pub fn remove(data_dir: &Path, bundle: &str, store_id: &str) -> Result<bool, SnapshotError> {
        let path = Self::store_path(data_dir, bundle, store_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
