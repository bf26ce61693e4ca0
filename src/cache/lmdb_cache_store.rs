//! LMDB-backed cache store implementation.
//!
//! Uses the heed crate to provide a persistent key-value store backed by
//! LMDB. The backing directory is a dedicated temporary location, created
//! lazily when the store is first touched and destroyed entirely (directory
//! and contents) when the store is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::cache_store::{CacheError, CacheStore, CacheValue, Result};

/// Maximum size of the memory map backing the cache.
const MAP_SIZE: usize = 1024 * 1024 * 1024; // 1GB

fn storage(e: impl std::fmt::Display) -> CacheError {
    CacheError::Storage(e.to_string())
}

// =============================================================================
// LmdbCacheStore
// =============================================================================

struct LmdbHandle {
    env: Arc<Env>,
    db: Database<Bytes, Bytes>,
}

/// An LMDB-backed [`CacheStore`] living in a temporary directory.
pub struct LmdbCacheStore {
    dir: Option<tempfile::TempDir>,
    path: PathBuf,
    handle: OnceCell<LmdbHandle>,
}

impl LmdbCacheStore {
    /// Create a store whose backing directory is reserved immediately but
    /// only populated on first use.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .suffix(".DataGatorCache")
            .tempdir()?;
        let path = dir.path().to_path_buf();
        Ok(Self {
            dir: Some(dir),
            path,
            handle: OnceCell::new(),
        })
    }

    /// Location of the backing storage.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn handle(&self) -> Result<&LmdbHandle> {
        self.handle
            .get_or_try_init(|| async {
                let path = self.path.clone();
                tokio::task::spawn_blocking(move || open_env(&path))
                    .await
                    .map_err(storage)?
            })
            .await
    }
}

fn open_env(path: &Path) -> Result<LmdbHandle> {
    debug!(path = %path.display(), "initializing local cache");
    std::fs::create_dir_all(path)?;

    let env = unsafe {
        EnvOpenOptions::new()
            .map_size(MAP_SIZE)
            .max_dbs(1)
            .open(path)
            .map_err(storage)?
    };

    let mut wtxn = env.write_txn().map_err(storage)?;
    let db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, None).map_err(storage)?;
    wtxn.commit().map_err(storage)?;

    Ok(LmdbHandle {
        env: Arc::new(env),
        db,
    })
}

impl Drop for LmdbCacheStore {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "destroying local cache");
        // close the environment before removing its files
        drop(self.handle.take());
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                // resource release only; never propagated
                warn!("failed to destroy local cache: {}", e);
            }
        }
    }
}

// =============================================================================
// CacheStore Implementation
// =============================================================================

#[async_trait]
impl CacheStore for LmdbCacheStore {
    async fn exists(&self, key: &str) -> bool {
        debug!(key, "looking up in cache");
        let handle = match self.handle().await {
            Ok(h) => h,
            Err(e) => {
                warn!("cache unreadable, treating '{}' as absent: {}", key, e);
                return false;
            }
        };
        let env = handle.env.clone();
        let db = handle.db;
        let key_bytes = key.as_bytes().to_vec();

        let looked_up = tokio::task::spawn_blocking(move || -> heed::Result<bool> {
            let rtxn = env.read_txn()?;
            Ok(db.get(&rtxn, &key_bytes)?.is_some())
        })
        .await;

        match looked_up {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!("cache lookup failed for '{}': {}", key, e);
                false
            }
            Err(e) => {
                warn!("cache lookup failed for '{}': {}", key, e);
                false
            }
        }
    }

    async fn get(&self, key: &str) -> Option<CacheValue> {
        debug!(key, "fetching from cache");
        let handle = match self.handle().await {
            Ok(h) => h,
            Err(e) => {
                warn!("cache unreadable, treating '{}' as a miss: {}", key, e);
                return None;
            }
        };
        let env = handle.env.clone();
        let db = handle.db;
        let key_bytes = key.as_bytes().to_vec();

        let fetched = tokio::task::spawn_blocking(move || -> heed::Result<Option<Vec<u8>>> {
            let rtxn = env.read_txn()?;
            Ok(db.get(&rtxn, &key_bytes)?.map(|v| v.to_vec()))
        })
        .await;

        match fetched {
            Ok(Ok(raw)) => raw.map(CacheValue::decode),
            Ok(Err(e)) => {
                warn!("cache read failed for '{}': {}", key, e);
                None
            }
            Err(e) => {
                warn!("cache read failed for '{}': {}", key, e);
                None
            }
        }
    }

    async fn put(&self, key: &str, value: CacheValue) -> Result<()> {
        debug!(key, "putting to cache");
        let encoded = value.encode()?;
        let handle = self.handle().await?;
        let env = handle.env.clone();
        let db = handle.db;
        let key_bytes = key.as_bytes().to_vec();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut wtxn = env.write_txn().map_err(storage)?;
            db.put(&mut wtxn, &key_bytes, &encoded).map_err(storage)?;
            wtxn.commit().map_err(storage)?;
            Ok(())
        })
        .await
        .map_err(storage)?
    }

    async fn delete(&self, key: &str) -> Result<()> {
        debug!(key, "deleting from cache");
        let handle = self.handle().await?;
        let env = handle.env.clone();
        let db = handle.db;
        let key_bytes = key.as_bytes().to_vec();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut wtxn = env.write_txn().map_err(storage)?;
            // absent keys are a defined no-op
            db.delete(&mut wtxn, &key_bytes).map_err(storage)?;
            wtxn.commit().map_err(storage)?;
            Ok(())
        })
        .await
        .map_err(storage)?
    }
}

// =============================================================================
// Tests
// =============================================================================
