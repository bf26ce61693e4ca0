//! Cache store trait and value types.
//!
//! This module defines the disk-persisted cache interface shared by all
//! entities in a process. Keys are entity URIs; values are JSON documents
//! or raw byte payloads.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use crate::protocol::{self, JsonError};

// =============================================================================
// Error Types
// =============================================================================

/// Error type for cache store operations.
///
/// Only `put` and `delete` surface these; reads degrade to cache misses.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage engine error (e.g. from LMDB).
    #[error("storage error: {0}")]
    Storage(String),

    /// Encoding error while canonicalizing a document.
    #[error("encoding error: {0}")]
    Encoding(#[from] JsonError),
}

/// Result type for cache store operations.
pub type Result<T> = std::result::Result<T, CacheError>;

// =============================================================================
// CacheValue
// =============================================================================

/// A cached value: a decoded JSON document or a raw byte payload.
///
/// Raw payloads whose bytes happen to be valid JSON decode back to
/// [`CacheValue::Document`] on retrieval; a byte payload is only returned
/// when the stored bytes are not a JSON document.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// A JSON document, stored in its canonical serialization.
    Document(Value),
    /// An opaque byte payload, stored verbatim.
    Raw(Bytes),
}

impl CacheValue {
    /// The decoded JSON document, if this value is one.
    pub fn into_document(self) -> Option<Value> {
        match self {
            CacheValue::Document(value) => Some(value),
            CacheValue::Raw(bytes) => serde_json::from_slice(&bytes).ok(),
        }
    }

    /// Serialize for storage: documents canonically, payloads verbatim.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            CacheValue::Document(value) => Ok(protocol::to_canonical_json(value)?),
            CacheValue::Raw(bytes) => Ok(bytes.to_vec()),
        }
    }

    /// Reconstruct a value from stored bytes.
    pub fn decode(raw: Vec<u8>) -> Self {
        match serde_json::from_slice(&raw) {
            Ok(value) => CacheValue::Document(value),
            Err(_) => CacheValue::Raw(Bytes::from(raw)),
        }
    }
}

impl From<Value> for CacheValue {
    fn from(value: Value) -> Self {
        CacheValue::Document(value)
    }
}

impl From<Bytes> for CacheValue {
    fn from(bytes: Bytes) -> Self {
        CacheValue::Raw(bytes)
    }
}

// =============================================================================
// CacheStore Trait
// =============================================================================

/// A disk-persisted cache shared by all entities in a process.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Check if a key exists without deserializing its value.
    ///
    /// An unreadable store answers `false`.
    async fn exists(&self, key: &str) -> bool;

    /// Get the value for a key.
    ///
    /// Never fails: a missing key, a corrupt entry, or an unreadable store
    /// all degrade to `None`.
    async fn get(&self, key: &str) -> Option<CacheValue>;

    /// Store a value under a key, replacing any previous value.
    async fn put(&self, key: &str, value: CacheValue) -> Result<()>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}
