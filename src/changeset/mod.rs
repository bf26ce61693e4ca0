//! Batched change-set accumulation and commit.

mod writer;

pub use writer::{ChangeSetError, ChangeSetWriter, Result, DEFAULT_BYTE_CEILING};
