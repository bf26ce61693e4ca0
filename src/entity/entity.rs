//! Abstract base of all client-side entities.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::protocol::{self, JsonResult};

use super::Kind;

/// A client-side object whose authoritative state lives in the backend
/// service.
///
/// Implementors supply their type tag, their resource URI, and their
/// canonical identity document; the read-through/write-through caching
/// contract is provided by [`Context`](super::Context) operations accepting
/// any `&dyn Entity`.
pub trait Entity: Send + Sync {
    /// Normalized type tag of this entity.
    fn kind(&self) -> &Kind;

    /// Resource URI relative to the API root. Derived from identity
    /// fields, never stored.
    fn uri(&self) -> String;

    /// Canonical JSON identity document (the entity's *ref*).
    ///
    /// Must validate against the backend schema before any network
    /// operation on the entity proceeds.
    fn ref_doc(&self) -> Value;
}

/// Stable SHA-256 digest of an entity's identity document.
///
/// Computed over the canonical serialization, so structurally equal refs
/// share a digest regardless of key order.
pub fn ref_digest(entity: &dyn Entity) -> JsonResult<String> {
    let canonical = protocol::to_canonical_json(&entity.ref_doc())?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed {
        kind: Kind,
        doc: Value,
    }

    impl Entity for Fixed {
        fn kind(&self) -> &Kind {
            &self.kind
        }
        fn uri(&self) -> String {
            "fixture".to_string()
        }
        fn ref_doc(&self) -> Value {
            self.doc.clone()
        }
    }

    #[test]
    fn test_ref_digest_is_key_order_independent() {
        let a = Fixed {
            kind: Kind::Repo,
            doc: json!({"kind": "datagator#Repo", "name": "pardee"}),
        };
        let b = Fixed {
            kind: Kind::Repo,
            doc: json!({"name": "pardee", "kind": "datagator#Repo"}),
        };
        assert_eq!(ref_digest(&a).unwrap(), ref_digest(&b).unwrap());

        let c = Fixed {
            kind: Kind::Repo,
            doc: json!({"kind": "datagator#Repo", "name": "other"}),
        };
        assert_ne!(ref_digest(&a).unwrap(), ref_digest(&c).unwrap());
    }
}
