//! Batched change-set writer for dataset revisions.
//!
//! A [`ChangeSetWriter`] accumulates key→value mutations for one dataset
//! into a single JSON object, held in a spooled buffer under a byte
//! ceiling. The buffer is committed as one PATCH (PUT for the legacy v1
//! protocol) which the backend acknowledges with 202 and a task `Location`.
//! At most one writer may be open per dataset at any time; a second open
//! fails immediately instead of waiting.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::{BufMut, BytesMut};
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::backend::{Payload, TransportError};
use crate::cache::CacheError;
use crate::config::ApiVersion;
use crate::entity::Context;
use crate::protocol::JsonError;
use crate::response::{ValidateError, ValidatedResponse};
use crate::task::Task;
use crate::util::{SpooledBuffer, DEFAULT_SPILL_THRESHOLD};

/// Default byte ceiling for one change-set payload: 16 MiB.
pub const DEFAULT_BYTE_CEILING: usize = 16 * 1024 * 1024;

// =============================================================================
// Error Types
// =============================================================================

/// Error type for change-set operations.
#[derive(Debug, Error)]
pub enum ChangeSetError {
    /// A second writer was opened while one is already accumulating for
    /// the same dataset.
    #[error("another change-set writer is already open for '{0}'")]
    ConcurrencyViolation(String),

    /// Transport failure during commit.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend rejected the commit or answered unexpectedly.
    #[error(transparent)]
    Validate(#[from] ValidateError),

    /// Cache invalidation failure after a successful commit.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A value that cannot be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] JsonError),

    /// Buffer spooling failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for change-set operations.
pub type Result<T> = std::result::Result<T, ChangeSetError>;

// =============================================================================
// WriterSlot
// =============================================================================

/// Exclusive registration of a dataset URI in the context's open-writer
/// registry; released on drop.
struct WriterSlot {
    ctx: Arc<Context>,
    uri: String,
}

impl WriterSlot {
    fn acquire(ctx: &Arc<Context>, uri: &str) -> Result<Self> {
        let mut open = lock(ctx.open_writers());
        // fail-fast: never queue behind an existing writer
        if !open.insert(uri.to_string()) {
            return Err(ChangeSetError::ConcurrencyViolation(uri.to_string()));
        }
        Ok(Self {
            ctx: ctx.clone(),
            uri: uri.to_string(),
        })
    }
}

impl Drop for WriterSlot {
    fn drop(&mut self) {
        lock(self.ctx.open_writers()).remove(&self.uri);
    }
}

fn lock(registry: &Mutex<HashSet<String>>) -> std::sync::MutexGuard<'_, HashSet<String>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// ChangeSetWriter
// =============================================================================

/// Accumulator for one dataset's pending revision.
pub struct ChangeSetWriter {
    ctx: Arc<Context>,
    uri: String,
    repo_uri: String,
    buf: SpooledBuffer,
    entries: usize,
    byte_ceiling: usize,
    spill_threshold: usize,
    commit_on_abandon: bool,
    /// Set while the last commit attempt failed; cleared on success.
    poisoned: bool,
    _slot: WriterSlot,
}

impl ChangeSetWriter {
    /// Open a writer for `repo/dataset`, registering it as the dataset's
    /// single writer.
    pub(crate) fn open(ctx: Arc<Context>, repo: &str, dataset: &str) -> Result<Self> {
        let uri = format!("{}/{}", repo, dataset);
        let slot = WriterSlot::acquire(&ctx, &uri)?;
        let commit_on_abandon = ctx.config().commit_on_abandon;
        Ok(Self {
            ctx,
            uri,
            repo_uri: repo.to_string(),
            buf: SpooledBuffer::new(DEFAULT_SPILL_THRESHOLD),
            entries: 0,
            byte_ceiling: DEFAULT_BYTE_CEILING,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            commit_on_abandon,
            poisoned: false,
            _slot: slot,
        })
    }

    /// Adjust the byte ceiling that triggers automatic commits.
    pub fn with_byte_ceiling(mut self, bytes: usize) -> Self {
        self.byte_ceiling = bytes;
        self
    }

    /// Adjust the buffer spill threshold. Only effective while the buffer
    /// is still empty.
    pub fn with_spill_threshold(mut self, bytes: usize) -> Self {
        self.spill_threshold = bytes;
        if self.buf.is_empty() {
            self.buf = SpooledBuffer::new(bytes);
        }
        self
    }

    /// URI of the target dataset.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Number of entries buffered since the last commit.
    pub fn pending(&self) -> usize {
        self.entries
    }

    /// Bytes buffered since the last commit (excluding the object frame).
    pub fn buffered_bytes(&self) -> usize {
        self.buf.len()
    }

    // =========================================================================
    // Accumulation
    // =========================================================================

    /// Buffer a key→value write.
    pub async fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        let serialized = serde_json::to_vec(value).map_err(JsonError::Serialize)?;
        self.append(key, &serialized).await
    }

    /// Buffer a key→value write from pre-serialized JSON, copied verbatim.
    pub async fn set_raw(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.append(key, value).await
    }

    /// Buffer a deletion of `key` in the revision being built.
    ///
    /// JSON `null` is the in-band delete sentinel.
    pub async fn remove(&mut self, key: &str) -> Result<()> {
        self.append(key, b"null").await
    }

    async fn append(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let key_json = serde_json::to_vec(key).map_err(JsonError::Serialize)?;
        if self.entries > 0 {
            self.buf.write(b",")?;
        }
        self.buf.write(&key_json)?;
        self.buf.write(b":")?;
        self.buf.write(value)?;
        self.entries += 1;

        // the framed object is the buffer plus two braces
        if self.buf.len() + 2 >= self.byte_ceiling {
            debug!(uri = %self.uri, "byte ceiling reached, committing mid-scope");
            self.commit().await?;
        }
        Ok(())
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Commit the buffered change-set.
    ///
    /// An empty buffer is a no-op: no request is issued. On success the
    /// writer rewinds to a fresh buffer (the acknowledged batch can never
    /// be committed twice) and the dataset's and owning repo's cache
    /// entries are invalidated. On failure the buffer is left intact so a
    /// retry can reuse it.
    pub async fn commit(&mut self) -> Result<Option<Task>> {
        if self.entries == 0 {
            return Ok(None);
        }
        match self.try_commit().await {
            Ok(task) => {
                self.poisoned = false;
                Ok(task)
            }
            Err(e) => {
                self.poisoned = true;
                Err(e)
            }
        }
    }

    async fn try_commit(&mut self) -> Result<Option<Task>> {
        debug!(uri = %self.uri, entries = self.entries, "committing change-set");

        let body = self.buf.to_bytes()?;
        let mut payload = BytesMut::with_capacity(body.len() + 2);
        payload.put_u8(b'{');
        payload.extend_from_slice(&body);
        payload.put_u8(b'}');
        let payload = Payload::Raw(payload.freeze());

        let response = match self.ctx.config().version {
            ApiVersion::V2 => {
                self.ctx
                    .service()
                    .patch(&self.uri, payload, HeaderMap::new())
                    .await?
            }
            // legacy protocol commits whole revisions with PUT
            ApiVersion::V1 => {
                self.ctx
                    .service()
                    .put(&self.uri, payload, HeaderMap::new())
                    .await?
            }
        };

        // the backend must accept the revision for asynchronous processing
        let validated =
            ValidatedResponse::receive(response, self.ctx.schema(), &[StatusCode::ACCEPTED])
                .await?;
        let task = validated
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|location| Task::new(self.ctx.clone(), location.to_string()));

        // rewind for the next batch under the same logical session
        self.buf = SpooledBuffer::new(self.spill_threshold);
        self.entries = 0;

        // force the next read of the dataset and its repo to resynchronize
        self.ctx.store().delete(&self.uri).await?;
        self.ctx.store().delete(&self.repo_uri).await?;

        Ok(task)
    }

    /// Commit any remaining entries and release the writer.
    ///
    /// This is the normal scope exit; dropping the writer without calling
    /// it discards buffered writes.
    pub async fn finish(mut self) -> Result<Option<Task>> {
        self.commit().await
    }
}

impl Drop for ChangeSetWriter {
    fn drop(&mut self) {
        if self.entries == 0 {
            return;
        }
        // the caller should have committed explicitly
        warn!(
            uri = %self.uri,
            entries = self.entries,
            "change-set writer dropped with unflushed entries"
        );
        if !self.commit_on_abandon || self.poisoned {
            warn!(uri = %self.uri, "discarding buffered writes");
            return;
        }
        // one best-effort attempt; failures are logged, never propagated
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) if h.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => h,
            _ => {
                warn!(
                    uri = %self.uri,
                    "no multi-thread runtime for the last-chance commit, discarding"
                );
                return;
            }
        };
        let drained = tokio::task::block_in_place(|| handle.block_on(self.commit()));
        match drained {
            Ok(_) => warn!(uri = %self.uri, "drained abandoned change-set writer"),
            Err(e) => warn!(uri = %self.uri, "last-chance commit failed: {}", e),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
