//! Durability layer for distkv
//!
//! This crate persists whole stores as checksummed snapshot files:
//! - SnapshotWriter: header + CRC32 + bincode payload, atomic rename
//! - SnapshotReader: header and checksum validation, payload decoding
//! - SnapshotDiscovery: listing the stores persisted for a bundle

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod snapshot;

pub use snapshot::{
    SnapshotData, SnapshotDiscovery, SnapshotError, SnapshotHeader, SnapshotReader,
    SnapshotWriter, SNAPSHOT_EXTENSION, SNAPSHOT_FORMAT_VERSION, SNAPSHOT_MAGIC,
};
