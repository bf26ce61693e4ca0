//! Repository entity.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::Credentials;
use crate::entity::{Context, Entity, EntityError, Kind, Result};

use super::dataset::{DataSet, RevSpec};
use super::is_valid_name;

/// A named remote account/namespace owning datasets.
///
/// Opening a repository eagerly verifies its existence with a cache read.
/// There is no client-side delete: the backend rejects repository deletion
/// by design.
pub struct Repo {
    ctx: Arc<Context>,
    name: String,
    kind: Kind,
}

impl Repo {
    /// Open a repository for reading.
    pub async fn open(ctx: Arc<Context>, name: &str) -> Result<Self> {
        Self::open_inner(ctx, name, None).await
    }

    /// Open a repository with a write secret, installed into the transport
    /// for subsequent mutating requests.
    pub async fn open_with_secret(ctx: Arc<Context>, name: &str, secret: &str) -> Result<Self> {
        Self::open_inner(ctx, name, Some(secret)).await
    }

    async fn open_inner(ctx: Arc<Context>, name: &str, secret: Option<&str>) -> Result<Self> {
        if !is_valid_name(name) {
            return Err(EntityError::InvalidName {
                noun: "repository",
                name: name.to_string(),
            });
        }
        let repo = Self {
            ctx: ctx.clone(),
            name: name.to_string(),
            kind: Kind::Repo,
        };
        if let Some(secret) = secret {
            ctx.service().set_auth(Some(Credentials {
                name: name.to_string(),
                secret: secret.to_string(),
            }));
        }
        // force a cache read to verify existence
        repo.document().await?;
        Ok(repo)
    }

    /// Repository name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared context this repository was opened against.
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Current repository document (read-through).
    pub async fn document(&self) -> Result<Value> {
        self.ctx.fetch(self).await
    }

    /// Document guaranteed to carry `field`, invalidating a dirty cache
    /// entry and refetching once if necessary.
    async fn document_with(&self, field: &str) -> Result<Value> {
        let document = self.ctx.fetch(self).await?;
        if document.get(field).is_some() {
            return Ok(document);
        }
        // invalidate dirty cache
        self.ctx.invalidate(self).await?;
        self.ctx.fetch(self).await
    }

    /// Lightweight handle on a dataset; no network call is made.
    pub fn dataset(&self, name: &str) -> Result<DataSet> {
        DataSet::new(self.ctx.clone(), self.name.clone(), name, RevSpec::Unpinned)
    }

    /// A dataset synchronized at the given revision spec.
    ///
    /// [`RevSpec::Latest`] refetches and pins to the backend's current
    /// revision; [`RevSpec::Pinned`] fails with a revision inconsistency
    /// if the backend disagrees.
    pub async fn dataset_at(&self, name: &str, rev: RevSpec) -> Result<DataSet> {
        let dataset = DataSet::new(self.ctx.clone(), self.name.clone(), name, rev)?;
        dataset.rev().await?;
        Ok(dataset)
    }

    /// Whether the repository currently contains a dataset of this name.
    ///
    /// Names violating the name pattern are never contained.
    pub async fn contains(&self, name: &str) -> Result<bool> {
        if !is_valid_name(name) {
            return Ok(false);
        }
        let document = self.document_with("items").await?;
        let found = item_names(&document).any(|n| n == name);
        Ok(found)
    }

    /// Handles on all datasets listed by the current document.
    pub async fn datasets(&self) -> Result<Vec<DataSet>> {
        let document = self.document_with("items").await?;
        item_names(&document)
            .map(|name| self.dataset(name))
            .collect()
    }

    /// Number of datasets, from the `itemsCount` field.
    pub async fn dataset_count(&self) -> Result<usize> {
        let document = self.document_with("itemsCount").await?;
        Ok(document["itemsCount"].as_u64().unwrap_or(0) as usize)
    }
}

fn item_names(document: &Value) -> impl Iterator<Item = &str> {
    document["items"]
        .as_array()
        .map(|items| items.as_slice())
        .unwrap_or(&[])
        .iter()
        .filter_map(|item| item["name"].as_str())
}

impl Entity for Repo {
    fn kind(&self) -> &Kind {
        &self.kind
    }

    fn uri(&self) -> String {
        self.name.clone()
    }

    fn ref_doc(&self) -> Value {
        json!({
            "kind": self.kind.qualified(),
            "name": self.name,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DataGatorService;
    use crate::cache::LmdbCacheStore;
    use crate::config::ApiConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn context_for(server: &MockServer) -> Arc<Context> {
        let uri = server.uri();
        let (scheme, host) = uri.split_once("://").unwrap();
        let config = ApiConfig {
            scheme: scheme.to_string(),
            host: host.to_string(),
            ..ApiConfig::default()
        };
        let service = DataGatorService::new(&config).unwrap();
        let schema_doc = serde_json::json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "type": "object",
            "required": ["kind"]
        });
        let store = LmdbCacheStore::new().unwrap();
        Context::with_parts(config, service, &schema_doc, Box::new(store)).unwrap()
    }

    fn repo_document() -> Value {
        json!({
            "kind": "datagator#Repo",
            "name": "pardee",
            "items": [
                {"kind": "datagator#DataSet", "name": "IGO_Members"},
                {"kind": "datagator#DataSet", "name": "Bakery"}
            ],
            "itemsCount": 2
        })
    }

    #[tokio::test]
    async fn test_open_verifies_existence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/pardee"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_document()))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = context_for(&server).await;
        let repo = Repo::open(ctx, "pardee").await.unwrap();
        assert_eq!(repo.name(), "pardee");
        assert_eq!(repo.uri(), "pardee");
    }

    #[tokio::test]
    async fn test_open_nonexistent_repo_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/NonExistence"))
            .respond_with(ResponseTemplate::new(404).set_body_json(
                json!({"kind": "datagator#Error", "code": 404, "message": "not found"}),
            ))
            .mount(&server)
            .await;

        let ctx = context_for(&server).await;
        let result = Repo::open(ctx, "NonExistence").await;
        assert!(matches!(result, Err(EntityError::Validate(_))));
    }

    #[tokio::test]
    async fn test_invalid_repo_name_fails_without_network() {
        let server = MockServer::start().await;
        let ctx = context_for(&server).await;
        let result = Repo::open(ctx, "A#B").await;
        assert!(matches!(result, Err(EntityError::InvalidName { .. })));
    }

    #[tokio::test]
    async fn test_contains_and_iteration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/pardee"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_document()))
            .mount(&server)
            .await;

        let ctx = context_for(&server).await;
        let repo = Repo::open(ctx, "pardee").await.unwrap();

        assert!(repo.contains("IGO_Members").await.unwrap());
        assert!(!repo.contains("NonExistence").await.unwrap());
        // names violating the pattern are never contained
        assert!(!repo.contains("A#B").await.unwrap());
        assert!(!repo.contains("IGO_Members/UN").await.unwrap());

        let datasets = repo.datasets().await.unwrap();
        let names: Vec<&str> = datasets.iter().map(|d| d.name()).collect();
        assert_eq!(names, ["IGO_Members", "Bakery"]);
        assert_eq!(repo.dataset_count().await.unwrap(), datasets.len());
    }

    #[tokio::test]
    async fn test_stale_document_is_refetched_for_items() {
        let server = MockServer::start().await;
        // first response lacks `items`; the refetch carries it
        Mock::given(method("GET"))
            .and(path("/api/v2/pardee"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"kind": "datagator#Repo", "name": "pardee"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/pardee"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_document()))
            .mount(&server)
            .await;

        let ctx = context_for(&server).await;
        let repo = Repo::open(ctx, "pardee").await.unwrap();
        let datasets = repo.datasets().await.unwrap();
        assert_eq!(datasets.len(), 2);
    }
}
