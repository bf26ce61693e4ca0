//! Transport facade over the backend HTTP API.

mod service;

pub use service::{DataGatorService, Payload, PostFile, Result, TransportError};
