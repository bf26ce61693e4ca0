//! Data item entities (Matrix, Recipe, Opaque, and the generic fallback).

use std::sync::Arc;

use serde_json::{json, Value};

use crate::entity::{normalized, Context, Entity, EntityError, Kind, Result};

use super::dataset::DataSet;
use super::is_valid_key;

/// A single named entry within a dataset's item collection.
///
/// The concrete variant is selected by the item's kind tag at construction
/// time through a closed registry: `Matrix`, `Recipe`, and `Opaque` are
/// recognized; any other known entity kind is rejected; unrecognized tags
/// fall back to [`Kind::Generic`].
pub struct DataItem {
    ctx: Arc<Context>,
    repo_name: String,
    dataset_name: String,
    key: String,
    kind: Kind,
}

impl DataItem {
    /// Registry dispatch from a kind tag.
    pub(crate) fn dispatch(dataset: &DataSet, kind_tag: &str, key: &str) -> Result<Self> {
        let kind = match Kind::from_tag(kind_tag) {
            Some(kind @ (Kind::Matrix | Kind::Recipe | Kind::Opaque)) => kind,
            Some(other) => {
                // a known kind that is not a data item signals a corrupt
                // item collection
                return Err(EntityError::Other(format!(
                    "unexpected data item kind '{}'",
                    other
                )));
            }
            None => Kind::Generic(normalized(kind_tag).to_string()),
        };
        if !is_valid_key(key) {
            return Err(EntityError::InvalidName {
                noun: "data item",
                name: key.to_string(),
            });
        }
        Ok(Self {
            ctx: dataset.context().clone(),
            repo_name: dataset.repo_name().to_string(),
            dataset_name: dataset.name().to_string(),
            key: key.to_string(),
            kind,
        })
    }

    /// Item key within its dataset.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Normalized kind of this item.
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Name of the dataset holding this item.
    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    /// Current item document (read-through).
    pub async fn document(&self) -> Result<Value> {
        self.ctx.fetch(self).await
    }
}

impl Entity for DataItem {
    fn kind(&self) -> &Kind {
        &self.kind
    }

    fn uri(&self) -> String {
        format!("{}/{}/{}", self.repo_name, self.dataset_name, self.key)
    }

    // The reference of a data item reuses the dataset document shape, with
    // `items` pinned to exactly this item and `itemsCount` fixed at 1.
    fn ref_doc(&self) -> Value {
        json!({
            "kind": Kind::DataSet.qualified(),
            "name": self.dataset_name,
            "repo": {
                "kind": Kind::Repo.qualified(),
                "name": self.repo_name,
            },
            "items": [
                {"kind": self.kind.qualified(), "name": self.key},
            ],
            "itemsCount": 1,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
