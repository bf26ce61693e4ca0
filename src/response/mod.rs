//! Response validation gate for every read from the backend.

mod validated;

pub use validated::{Result, ValidateError, ValidatedResponse};
