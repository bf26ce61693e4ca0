//! Repository, dataset, and data item entities.

mod data_item;
mod dataset;
#[allow(clippy::module_inception)]
mod repo;

pub use data_item::DataItem;
pub use dataset::{DataSet, RevSpec};
pub use repo::Repo;

/// Repository and dataset names: alphanumerics, `_` and `-` only.
///
/// Rejects in particular `/` (URI separator), `#` (namespace marker), and
/// `.` (revision separator).
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Item keys additionally allow `.` (e.g. `US_Membership.recipe`).
pub(crate) fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}
