//! Client configuration resolved from the process environment.

mod read_config;
mod types;

pub use read_config::{ConfigError, Result};
pub use types::{ApiConfig, ApiVersion, Credentials};
