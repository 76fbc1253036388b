//! # Formats
//!
//! Byte-level encodings of engine state. File I/O lives in the app layer.

pub mod persistence;

pub use persistence::{SnapshotHeader, store_from_bytes, store_to_bytes};
