//! DataSet entity and its revision state machine.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::changeset;
use crate::entity::{Context, Entity, EntityError, Kind, Result};
use crate::protocol::{self, DataSetDocument};

use super::data_item::DataItem;
use super::is_valid_name;

// =============================================================================
// RevSpec
// =============================================================================

/// How a dataset handle relates to the backend's revision stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevSpec {
    /// Not yet synchronized; the first cache access pins to the backend's
    /// current revision.
    Unpinned,
    /// The `-1` sentinel: always invalidate and refetch, then pin to
    /// whatever the backend currently reports. Never a stored state.
    Latest,
    /// A specific historical revision; synchronization fails unless the
    /// backend reports exactly this revision.
    Pinned(i64),
}

impl From<i64> for RevSpec {
    fn from(rev: i64) -> Self {
        if rev == -1 {
            RevSpec::Latest
        } else {
            RevSpec::Pinned(rev)
        }
    }
}

// =============================================================================
// DataSet
// =============================================================================

/// A named, revisioned collection of items inside a repository.
///
/// Handles are cheap: construction performs no network call. The first
/// access of [`rev`](Self::rev), the document, or the item collection
/// synchronizes with the backend according to the handle's [`RevSpec`].
pub struct DataSet {
    ctx: Arc<Context>,
    repo_name: String,
    name: String,
    kind: Kind,
    spec: RevSpec,
    rev: OnceCell<i64>,
}

impl DataSet {
    pub(crate) fn new(
        ctx: Arc<Context>,
        repo_name: String,
        name: &str,
        spec: RevSpec,
    ) -> Result<Self> {
        if !is_valid_name(name) {
            return Err(EntityError::InvalidName {
                noun: "dataset",
                name: name.to_string(),
            });
        }
        Ok(Self {
            ctx,
            repo_name,
            name: name.to_string(),
            kind: Kind::DataSet,
            spec,
            rev: OnceCell::new(),
        })
    }

    /// Dataset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning repository.
    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    /// The shared context this handle was created against.
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// URI of the dataset without any revision pin.
    pub fn base_uri(&self) -> String {
        format!("{}/{}", self.repo_name, self.name)
    }

    /// The pinned revision, synchronizing with the backend on first
    /// access.
    pub async fn rev(&self) -> Result<i64> {
        self.rev
            .get_or_try_init(|| self.synchronize())
            .await
            .map(|rev| *rev)
    }

    async fn synchronize(&self) -> Result<i64> {
        if self.spec == RevSpec::Latest {
            // the always-latest sentinel never becomes a stored state
            self.ctx.invalidate(self).await?;
        }
        let document = self.document_with("rev").await?;
        let reported = document["rev"].as_i64().ok_or_else(|| {
            EntityError::Other(format!(
                "dataset document for '{}' lacks a revision",
                self.base_uri()
            ))
        })?;
        if let RevSpec::Pinned(requested) = self.spec {
            if requested != reported {
                return Err(EntityError::RevisionInconsistency {
                    requested,
                    reported,
                });
            }
        }
        Ok(reported)
    }

    /// Current dataset document (read-through).
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

    /// The item collection, lazily built from the synchronized document.
    pub async fn items(&self) -> Result<Vec<DataItem>> {
        let document = self.document_with("items").await?;
        let parsed: DataSetDocument = protocol::from_value(document)?;
        if !parsed.is_consistent() {
            return Err(EntityError::Other(format!(
                "inconsistent dataset document for '{}': itemsCount disagrees with items",
                self.base_uri()
            )));
        }
        parsed
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|item| DataItem::dispatch(self, &item.kind, &item.name))
            .collect()
    }

    /// A single item by key, or `None` if the dataset has no such item.
    pub async fn item(&self, key: &str) -> Result<Option<DataItem>> {
        let items = self.items().await?;
        Ok(items.into_iter().find(|item| item.key() == key))
    }

    /// Number of items, from the `itemsCount` field.
    pub async fn item_count(&self) -> Result<usize> {
        let document = self.document_with("itemsCount").await?;
        Ok(document["itemsCount"].as_u64().unwrap_or(0) as usize)
    }

    /// Open the change-set writer for this dataset.
    ///
    /// Fails fast if another writer for the same dataset is already open.
    pub fn open_changes(&self) -> changeset::Result<changeset::ChangeSetWriter> {
        changeset::ChangeSetWriter::open(self.ctx.clone(), &self.repo_name, &self.name)
    }
}

impl Entity for DataSet {
    fn kind(&self) -> &Kind {
        &self.kind
    }

    fn uri(&self) -> String {
        match self.spec {
            // historical revisions live at their own URI
            RevSpec::Pinned(rev) => format!("{}/{}.{}", self.repo_name, self.name, rev),
            _ => self.base_uri(),
        }
    }

    fn ref_doc(&self) -> Value {
        json!({
            "kind": self.kind.qualified(),
            "name": self.name,
            "repo": {
                "kind": Kind::Repo.qualified(),
                "name": self.repo_name,
            },
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
