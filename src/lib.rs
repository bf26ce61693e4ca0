//! datagator-client - Rust client library for the DataGator data-repository
//! service.
//!
//! Repositories, versioned datasets, and data items are modeled as local
//! entities backed by the remote HTTP(S)+JSON API, with a disk-persisted
//! cache shared across all entities and a batched change-set protocol for
//! committing dataset revisions.

pub mod backend;
pub mod cache;
pub mod changeset;
pub mod config;
pub mod entity;
pub mod protocol;
pub mod repo;
pub mod response;
pub mod schema;
pub mod task;
pub mod util;

pub use backend::{DataGatorService, Payload, TransportError};
pub use cache::{CacheError, CacheStore, CacheValue, LmdbCacheStore};
pub use changeset::{ChangeSetError, ChangeSetWriter};
pub use config::{ApiConfig, ApiVersion, Credentials};
pub use entity::{Context, Entity, EntityError, Kind};
pub use repo::{DataItem, DataSet, Repo, RevSpec};
pub use response::{ValidateError, ValidatedResponse};
pub use schema::{SchemaError, SchemaValidator};
pub use task::Task;
