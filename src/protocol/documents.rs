//! Wire document types for the DataGator backend protocol.
//!
//! This module defines the JSON envelopes exchanged with the backend
//! service. Every entity document carries a `kind` field namespaced as
//! `"datagator#<Type>"`. Cached documents are stored as canonical JSON
//! (RFC 8785).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Namespace prefix carried by every `kind` field on the wire.
pub const KIND_NAMESPACE: &str = "datagator#";

/// The only media type the backend speaks.
pub const JSON_MEDIA_TYPE: &str = "application/json";

// =============================================================================
// Error / Status Envelopes
// =============================================================================

/// Error envelope returned by the backend on failed requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Kind tag, always `"datagator#Error"`.
    pub kind: String,
    /// Numeric error code (mirrors the HTTP status).
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

impl ErrorEnvelope {
    /// Parse an error envelope out of a decoded document, if it is one.
    pub fn from_document(document: &Value) -> Option<Self> {
        let envelope: Self = serde_json::from_value(document.clone()).ok()?;
        if envelope.kind == format!("{}Error", KIND_NAMESPACE) {
            Some(envelope)
        } else {
            None
        }
    }
}

/// Status envelope acknowledging an accepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEnvelope {
    /// Kind tag, always `"datagator#Status"`.
    pub kind: String,
    /// Numeric status code (mirrors the HTTP status).
    pub code: i64,
    /// Optional human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Task
// =============================================================================

/// Terminal and pending states of an asynchronous backend task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// The task completed successfully.
    #[serde(rename = "SUC")]
    Success,
    /// The task ended in error.
    #[serde(rename = "ERR")]
    Failure,
    /// Any other value means the task is still pending.
    #[serde(other)]
    Pending,
}

impl TaskStatus {
    /// Returns `true` once the task can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failure)
    }
}

/// A long-running operation tracked by the backend, polled at its
/// `Location` URL until the status is terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDocument {
    /// Kind tag, always `"datagator#Task"`.
    pub kind: String,
    /// Current task status.
    pub status: TaskStatus,
    /// Optional human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Entity References
// =============================================================================

/// Reference to a repository, as embedded in dataset documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    /// Kind tag, always `"datagator#Repo"`.
    pub kind: String,
    /// Repository name.
    pub name: String,
}

/// A single entry of a dataset's item collection: `{kind, name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    /// Kind tag of the item, e.g. `"datagator#Matrix"`.
    pub kind: String,
    /// Item name within the dataset.
    pub name: String,
}

// =============================================================================
// DataSet Document
// =============================================================================

/// A dataset document as returned by the backend.
///
/// `rev`, `items` and `items_count` are populated on synchronized
/// documents; reference documents carry only identity fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSetDocument {
    /// Kind tag, always `"datagator#DataSet"`.
    pub kind: String,
    /// Dataset name.
    pub name: String,
    /// Owning repository.
    pub repo: RepoRef,
    /// Revision number assigned by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rev: Option<i64>,
    /// Item collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemRef>>,
    /// Number of items; equals `items.len()` whenever both are present.
    #[serde(rename = "itemsCount", skip_serializing_if = "Option::is_none")]
    pub items_count: Option<i64>,
}

impl DataSetDocument {
    /// Check the `itemsCount == items.len()` consistency invariant.
    ///
    /// Vacuously true when either field is absent.
    pub fn is_consistent(&self) -> bool {
        match (&self.items, self.items_count) {
            (Some(items), Some(count)) => items.len() as i64 == count,
            _ => true,
        }
    }
}

// =============================================================================
// Document Helpers
// =============================================================================

/// The raw (namespaced) `kind` field of a decoded document, if present.
pub fn document_kind(document: &Value) -> Option<&str> {
    document.get("kind").and_then(Value::as_str)
}

// =============================================================================
// JSON Conversion Functions
// =============================================================================

/// Error type for JSON operations.
#[derive(Debug)]
pub enum JsonError {
    /// Serialization error.
    Serialize(serde_json::Error),
    /// Deserialization error.
    Deserialize(serde_json::Error),
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonError::Serialize(e) => write!(f, "JSON serialization error: {}", e),
            JsonError::Deserialize(e) => write!(f, "JSON deserialization error: {}", e),
        }
    }
}

impl std::error::Error for JsonError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JsonError::Serialize(e) | JsonError::Deserialize(e) => Some(e),
        }
    }
}

/// Result type for JSON operations.
pub type JsonResult<T> = std::result::Result<T, JsonError>;

/// Deserialize a wire document from JSON bytes.
pub fn from_json<T: for<'de> Deserialize<'de>>(json: &[u8]) -> JsonResult<T> {
    serde_json::from_slice(json).map_err(JsonError::Deserialize)
}

/// Deserialize a wire document from a decoded JSON value.
pub fn from_value<T: for<'de> Deserialize<'de>>(value: Value) -> JsonResult<T> {
    serde_json::from_value(value).map_err(JsonError::Deserialize)
}

/// Serialize a document to canonical JSON (RFC 8785).
///
/// Canonicalization makes cached representations byte-stable: object keys
/// are sorted and whitespace is dropped, so equal documents share one
/// encoding.
pub fn to_canonical_json<T: Serialize>(value: &T) -> JsonResult<Vec<u8>> {
    serde_json_canonicalizer::to_vec(value).map_err(JsonError::Serialize)
}

/// Serialize a document to a canonical JSON string.
pub fn to_canonical_json_string<T: Serialize>(value: &T) -> JsonResult<String> {
    serde_json_canonicalizer::to_string(value).map_err(JsonError::Serialize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_envelope_parsing() {
        let doc = json!({"kind": "datagator#Error", "code": 404, "message": "not found"});
        let envelope = ErrorEnvelope::from_document(&doc).unwrap();
        assert_eq!(envelope.code, 404);
        assert_eq!(envelope.message, "not found");

        // non-error documents are rejected
        let doc = json!({"kind": "datagator#Status", "code": 202, "message": "accepted"});
        assert!(ErrorEnvelope::from_document(&doc).is_none());
        let doc = json!({"name": "no kind here"});
        assert!(ErrorEnvelope::from_document(&doc).is_none());
    }

    #[test]
    fn test_task_status_decoding() {
        let task: TaskDocument =
            serde_json::from_value(json!({"kind": "datagator#Task", "status": "SUC"})).unwrap();
        assert_eq!(task.status, TaskStatus::Success);
        assert!(task.status.is_terminal());

        let task: TaskDocument =
            serde_json::from_value(json!({"kind": "datagator#Task", "status": "ERR"})).unwrap();
        assert_eq!(task.status, TaskStatus::Failure);

        let task: TaskDocument =
            serde_json::from_value(json!({"kind": "datagator#Task", "status": "RUN"})).unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(!task.status.is_terminal());
    }

    #[test]
    fn test_dataset_document_consistency() {
        let doc: DataSetDocument = serde_json::from_value(json!({
            "kind": "datagator#DataSet",
            "name": "IGO_Members",
            "repo": {"kind": "datagator#Repo", "name": "pardee"},
            "rev": 3,
            "items": [{"kind": "datagator#Matrix", "name": "UN"}],
            "itemsCount": 1
        }))
        .unwrap();
        assert!(doc.is_consistent());
        assert_eq!(doc.rev, Some(3));

        let doc: DataSetDocument = serde_json::from_value(json!({
            "kind": "datagator#DataSet",
            "name": "IGO_Members",
            "repo": {"kind": "datagator#Repo", "name": "pardee"},
            "items": [],
            "itemsCount": 2
        }))
        .unwrap();
        assert!(!doc.is_consistent());
    }

    #[test]
    fn test_dataset_reference_roundtrip() {
        let reference = DataSetDocument {
            kind: "datagator#DataSet".to_string(),
            name: "Bakery".to_string(),
            repo: RepoRef {
                kind: "datagator#Repo".to_string(),
                name: "pardee".to_string(),
            },
            rev: None,
            items: None,
            items_count: None,
        };

        let json = to_canonical_json_string(&reference).unwrap();
        // optional fields stay off the wire
        assert!(!json.contains("itemsCount"));
        assert!(!json.contains("rev"));

        let parsed: DataSetDocument = from_json(json.as_bytes()).unwrap();
        assert_eq!(parsed, reference);
    }

    #[test]
    fn test_canonical_json_is_key_sorted() {
        let value = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let canonical = to_canonical_json_string(&value).unwrap();
        assert_eq!(canonical, r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn test_document_kind() {
        let doc = json!({"kind": "datagator#Repo", "name": "pardee"});
        assert_eq!(document_kind(&doc), Some("datagator#Repo"));
        assert_eq!(document_kind(&json!({"name": "x"})), None);
        assert_eq!(document_kind(&json!([1, 2])), None);
    }
}
