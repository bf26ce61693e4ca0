//! Wire protocol documents and JSON helpers.

mod documents;

pub use documents::{
    DataSetDocument, ErrorEnvelope, ItemRef, JsonError, JsonResult, RepoRef, StatusEnvelope,
    TaskDocument, TaskStatus, document_kind, from_json, from_value, to_canonical_json,
    to_canonical_json_string, JSON_MEDIA_TYPE, KIND_NAMESPACE,
};
