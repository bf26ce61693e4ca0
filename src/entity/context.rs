//! Shared context and the entity caching contract.
//!
//! One [`Context`] per process holds the backend connection, the compiled
//! schema validator, and the cache store, shared by reference with every
//! entity. Its lifecycle is owned by the application's setup/teardown, not
//! by finalizers.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::backend::{DataGatorService, TransportError};
use crate::cache::{CacheError, CacheStore, CacheValue, LmdbCacheStore};
use crate::config::ApiConfig;
use crate::protocol::{self, JsonError};
use crate::response::{ValidateError, ValidatedResponse};
use crate::schema::{self, SchemaError, SchemaValidator};

use super::kind::normalized;
use super::Entity;

// =============================================================================
// Error Types
// =============================================================================

/// Error type for entity operations.
#[derive(Debug, Error)]
pub enum EntityError {
    /// Transport failure; surfaced unchanged, never retried.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response validation failure (shape, schema, or status).
    #[error(transparent)]
    Validate(#[from] ValidateError),

    /// Schema failure outside response validation (ref documents,
    /// write-through stores, validator initialization).
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Cache store failure on a write path.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] JsonError),

    /// A fetched document's kind disagrees with the requesting entity's;
    /// signals URI/type confusion or a server inconsistency.
    #[error("unexpected entity kind '{actual}', expected '{expected}'")]
    KindMismatch { expected: String, actual: String },

    /// A pinned historical revision disagrees with what the backend
    /// reports at that revision number.
    #[error("inconsistent revision: requested {requested}, backend reports {reported}")]
    RevisionInconsistency { requested: i64, reported: i64 },

    /// A repository, dataset, or item name violating the name pattern.
    #[error("invalid {noun} name '{name}'")]
    InvalidName { noun: &'static str, name: String },

    /// An asynchronous backend task ended in error.
    #[error("backend task ended in error: {message}")]
    TaskFailed { message: String },

    /// An asynchronous backend task did not reach a terminal state within
    /// the allowed number of polls.
    #[error("backend task still pending after {0} polls")]
    TaskIncomplete(usize),

    /// A custom error message.
    #[error("{0}")]
    Other(String),
}

/// Result type for entity operations.
pub type Result<T> = std::result::Result<T, EntityError>;

// =============================================================================
// Context
// =============================================================================

/// Process-wide shared state: backend connection, compiled schema, cache
/// store, and the open change-set writer registry.
pub struct Context {
    config: ApiConfig,
    service: DataGatorService,
    schema: SchemaValidator,
    store: Box<dyn CacheStore>,
    open_writers: Mutex<HashSet<String>>,
}

impl Context {
    /// One-stop initialization: build the transport from `config`, obtain
    /// and compile the backend schema, and create the cache store.
    pub async fn initialize(config: ApiConfig) -> Result<Arc<Self>> {
        let service = DataGatorService::new(&config)?;
        let schema_doc = schema::load_schema(&config, &service).await?;
        let validator = SchemaValidator::new(&schema_doc)?;
        let store = LmdbCacheStore::new()?;
        Ok(Arc::new(Self::assemble(
            config,
            service,
            validator,
            Box::new(store),
        )))
    }

    /// Assemble a context from prebuilt parts; `schema_doc` is compiled
    /// here.
    pub fn with_parts(
        config: ApiConfig,
        service: DataGatorService,
        schema_doc: &Value,
        store: Box<dyn CacheStore>,
    ) -> Result<Arc<Self>> {
        let validator = SchemaValidator::new(schema_doc)?;
        Ok(Arc::new(Self::assemble(config, service, validator, store)))
    }

    fn assemble(
        config: ApiConfig,
        service: DataGatorService,
        schema: SchemaValidator,
        store: Box<dyn CacheStore>,
    ) -> Self {
        Self {
            config,
            service,
            schema,
            store,
            open_writers: Mutex::new(HashSet::new()),
        }
    }

    /// Resolved client configuration.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// The backend transport.
    pub fn service(&self) -> &DataGatorService {
        &self.service
    }

    /// The compiled backend schema.
    pub fn schema(&self) -> &SchemaValidator {
        &self.schema
    }

    /// The shared cache store.
    pub fn store(&self) -> &dyn CacheStore {
        self.store.as_ref()
    }

    /// Registry of datasets with an open change-set writer.
    pub(crate) fn open_writers(&self) -> &Mutex<HashSet<String>> {
        &self.open_writers
    }

    // =========================================================================
    // Caching Contract
    // =========================================================================

    /// Read-through access to an entity's current document.
    ///
    /// Checks the cache store first; on a miss, fetches from the backend,
    /// validates the response, asserts the kind-matching invariant, and
    /// writes the result back into the cache unless the response forbids
    /// it (`Cache-Control: no-cache`).
    pub async fn fetch(&self, entity: &dyn Entity) -> Result<Value> {
        let uri = entity.uri();
        if let Some(cached) = self.store.get(&uri).await {
            if let Some(document) = cached.into_document() {
                return Ok(document);
            }
            // undecodable entry; treat as a miss and resynchronize
        }
        self.synchronize(entity).await
    }

    async fn synchronize(&self, entity: &dyn Entity) -> Result<Value> {
        let uri = entity.uri();
        debug!(uri, "synchronizing with backend");

        // the identity document must be schema-valid before any network
        // operation proceeds
        self.schema.validate(&entity.ref_doc())?;

        let response = self.service.get(&uri, HeaderMap::new()).await?;
        let validated =
            ValidatedResponse::receive(response, &self.schema, &[StatusCode::OK]).await?;

        // a valid response bears a matching entity kind; on mismatch the
        // cache must not be populated
        let tag = protocol::document_kind(validated.document())
            .unwrap_or("")
            .to_string();
        if !entity.kind().matches(&tag) {
            return Err(EntityError::KindMismatch {
                expected: entity.kind().as_str().to_string(),
                actual: normalized(&tag).to_string(),
            });
        }

        if validated.cacheable() {
            // storing the buffered bytes saves a round of re-encoding
            self.store
                .put(&uri, CacheValue::Raw(validated.raw().clone()))
                .await?;
        }

        Ok(validated.into_document())
    }

    /// Drop the cached document, forcing the next read to resynchronize.
    pub async fn invalidate(&self, entity: &dyn Entity) -> Result<()> {
        self.store.delete(&entity.uri()).await?;
        Ok(())
    }

    /// Write-through update of an entity's cached document.
    ///
    /// The document must be schema-valid and carry the entity's own kind.
    pub async fn store_document(&self, entity: &dyn Entity, document: Value) -> Result<()> {
        self.schema.validate(&document)?;

        let tag = protocol::document_kind(&document).unwrap_or("").to_string();
        if !entity.kind().matches(&tag) {
            return Err(EntityError::KindMismatch {
                expected: entity.kind().as_str().to_string(),
                actual: normalized(&tag).to_string(),
            });
        }

        self.store
            .put(&entity.uri(), CacheValue::Document(document))
            .await?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
