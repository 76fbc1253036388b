//! # Snapshots
//!
//! A snapshot is the `RELS` magic, one version byte, then the postcard form
//! of a `SerializableStore`. The file backend keeps its store in this shape
//! and `export --format snapshot` writes the same bytes.

use crate::store::{MemoryStore, SerializableStore};
use crate::{RelsyncError, primitives};

/// Largest snapshot `store_from_bytes` accepts.
const MAX_SNAPSHOT_SIZE: usize = 500 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub version: u8,
}

impl SnapshotHeader {
    /// Magic plus version byte.
    pub const LEN: usize = 5;

    pub const CURRENT: Self = Self {
        version: primitives::FORMAT_VERSION,
    };

    #[must_use]
    pub fn encode(self) -> [u8; Self::LEN] {
        let [m0, m1, m2, m3] = *primitives::MAGIC_BYTES;
        [m0, m1, m2, m3, self.version]
    }

    /// Split `bytes` into header and payload.
    ///
    /// Foreign data and other format versions are rejected here, so callers
    /// never hand them to postcard.
    pub fn decode(bytes: &[u8]) -> Result<(Self, &[u8]), RelsyncError> {
        let Some((magic, rest)) = bytes.split_first_chunk::<4>() else {
            return Err(corrupt("truncated header"));
        };
        if magic != primitives::MAGIC_BYTES {
            return Err(corrupt("not a relsync snapshot"));
        }
        let Some((&version, payload)) = rest.split_first() else {
            return Err(corrupt("truncated header"));
        };
        if version != primitives::FORMAT_VERSION {
            return Err(RelsyncError::DeserializationError(format!(
                "Snapshot version {version} is not supported (expected {})",
                primitives::FORMAT_VERSION
            )));
        }
        Ok((Self { version }, payload))
    }
}

fn corrupt(reason: &str) -> RelsyncError {
    RelsyncError::DeserializationError(format!("Corrupt snapshot: {reason}"))
}

pub fn store_to_bytes(store: &MemoryStore) -> Result<Vec<u8>, RelsyncError> {
    let payload = postcard::to_stdvec(&SerializableStore::from(store))
        .map_err(|e| RelsyncError::SerializationError(e.to_string()))?;

    let mut bytes = Vec::with_capacity(SnapshotHeader::LEN + payload.len());
    bytes.extend_from_slice(&SnapshotHeader::CURRENT.encode());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Rebuild a store from a snapshot. Size and header are checked first.
pub fn store_from_bytes(bytes: &[u8]) -> Result<MemoryStore, RelsyncError> {
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(RelsyncError::DeserializationError(format!(
            "Snapshot of {} bytes exceeds limit of {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    let (_, payload) = SnapshotHeader::decode(bytes)?;
    let serialized: SerializableStore = postcard::from_bytes(payload)
        .map_err(|e| RelsyncError::DeserializationError(format!("Corrupt snapshot: {e}")))?;
    Ok(MemoryStore::from(serialized))
}
