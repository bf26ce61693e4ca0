//! Entity kind tags and namespace normalization.
//!
//! On the wire every document's `kind` is namespaced (`"datagator#Repo"`);
//! internally the client compares bare tags. Unrecognized tags never map to
//! a known kind; data items alone have an explicit generic fallback.

use crate::protocol::KIND_NAMESPACE;

/// Strip the `datagator#` namespace off a kind tag.
pub fn normalized(tag: &str) -> &str {
    tag.strip_prefix(KIND_NAMESPACE).unwrap_or(tag)
}

/// Normalized type tag of a client-side entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    /// A named remote account/namespace.
    Repo,
    /// A named, revisioned collection of items inside a repo.
    DataSet,
    /// A tabular data item.
    Matrix,
    /// A computation recipe item.
    Recipe,
    /// An opaque payload item.
    Opaque,
    /// An asynchronous backend operation.
    Task,
    /// An error envelope.
    Error,
    /// A status envelope.
    Status,
    /// Generic fallback for data items of unrecognized kind; carries the
    /// normalized tag.
    Generic(String),
}

impl Kind {
    /// Look up a known kind by its (possibly namespaced) tag.
    ///
    /// Returns `None` for unrecognized tags; only data item construction
    /// falls back to [`Kind::Generic`].
    pub fn from_tag(tag: &str) -> Option<Kind> {
        match normalized(tag) {
            "Repo" => Some(Kind::Repo),
            "DataSet" => Some(Kind::DataSet),
            "Matrix" => Some(Kind::Matrix),
            "Recipe" => Some(Kind::Recipe),
            "Opaque" => Some(Kind::Opaque),
            "Task" => Some(Kind::Task),
            "Error" => Some(Kind::Error),
            "Status" => Some(Kind::Status),
            _ => None,
        }
    }

    /// The bare (namespace-free) tag.
    pub fn as_str(&self) -> &str {
        match self {
            Kind::Repo => "Repo",
            Kind::DataSet => "DataSet",
            Kind::Matrix => "Matrix",
            Kind::Recipe => "Recipe",
            Kind::Opaque => "Opaque",
            Kind::Task => "Task",
            Kind::Error => "Error",
            Kind::Status => "Status",
            Kind::Generic(tag) => tag,
        }
    }

    /// The wire form, with the namespace prefix re-attached.
    pub fn qualified(&self) -> String {
        format!("{}{}", KIND_NAMESPACE, self.as_str())
    }

    /// Whether a document's (possibly namespaced) kind tag denotes this
    /// kind.
    pub fn matches(&self, tag: &str) -> bool {
        normalized(tag) == self.as_str()
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_strips_namespace() {
        assert_eq!(normalized("datagator#Repo"), "Repo");
        assert_eq!(normalized("Repo"), "Repo");
        assert_eq!(normalized(""), "");
    }

    #[test]
    fn test_known_tags_resolve() {
        assert_eq!(Kind::from_tag("datagator#DataSet"), Some(Kind::DataSet));
        assert_eq!(Kind::from_tag("Matrix"), Some(Kind::Matrix));
        assert_eq!(Kind::from_tag("datagator#Bogus"), None);
    }

    #[test]
    fn test_qualified_round_trip() {
        assert_eq!(Kind::Repo.qualified(), "datagator#Repo");
        assert_eq!(Kind::Generic("Tensor".to_string()).qualified(), "datagator#Tensor");
        assert_eq!(Kind::from_tag(&Kind::Recipe.qualified()), Some(Kind::Recipe));
    }

    #[test]
    fn test_matching_ignores_namespace() {
        assert!(Kind::DataSet.matches("datagator#DataSet"));
        assert!(Kind::DataSet.matches("DataSet"));
        assert!(!Kind::DataSet.matches("datagator#Repo"));
        assert!(Kind::Generic("Tensor".to_string()).matches("datagator#Tensor"));
    }
}
