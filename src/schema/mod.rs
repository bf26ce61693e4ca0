//! Schema validation and schema document loading.

mod validator;

use serde_json::Value;
use tracing::debug;

use crate::backend::DataGatorService;
use crate::config::ApiConfig;

pub use validator::{Result, SchemaError, SchemaValidator};

/// Obtain the backend schema document.
///
/// A configured local file wins (fast, but may be stale); otherwise the
/// schema is fetched from the backend service (slow, but always current).
pub async fn load_schema(config: &ApiConfig, service: &DataGatorService) -> Result<Value> {
    if let Some(path) = &config.schema_file {
        debug!(path = %path.display(), "loading schema from local file");
        let raw = std::fs::read(path)
            .map_err(|e| SchemaError::Load(format!("{}: {}", path.display(), e)))?;
        return serde_json::from_slice(&raw)
            .map_err(|e| SchemaError::Load(format!("{}: {}", path.display(), e)));
    }
    debug!("fetching schema from backend service");
    service
        .schema()
        .await
        .map_err(|e| SchemaError::Load(e.to_string()))
}
