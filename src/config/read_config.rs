//! Configuration resolution from the process environment.
//!
//! Every setting has a `DATAGATOR_*` environment variable and a built-in
//! default; nothing is read from disk. `NDEBUG=1` takes precedence over
//! `DEBUG=1`, matching the backend service's own convention.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::{ApiConfig, ApiVersion, Credentials};

// =============================================================================
// Constants - Default Values
// =============================================================================

const DEFAULT_API_HOST: &str = "www.data-gator.com";
const DEFAULT_API_SCHEME: &str = "https";
const DEFAULT_API_VERSION: ApiVersion = ApiVersion::V2;
const DEFAULT_API_TIMEOUT_SECS: u64 = 180;
const DEFAULT_ACCEPT_ENCODING: &str = "gzip, deflate, identity";

const ENV_API_HOST: &str = "DATAGATOR_API_HOST";
const ENV_API_SCHEME: &str = "DATAGATOR_API_SCHEME";
const ENV_API_VERSION: &str = "DATAGATOR_API_VERSION";
const ENV_API_TIMEOUT: &str = "DATAGATOR_API_TIMEOUT";
const ENV_CREDENTIALS: &str = "DATAGATOR_CREDENTIALS";
const ENV_SCHEMA_FILE: &str = "DATAGATOR_SCHEMA_FILE";
const ENV_COMMIT_ON_ABANDON: &str = "DATAGATOR_COMMIT_ON_ABANDON";
const ENV_DEBUG: &str = "DEBUG";
const ENV_NDEBUG: &str = "NDEBUG";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported API version '{0}'")]
    InvalidVersion(String),

    #[error("invalid timeout '{value}': {source}")]
    InvalidTimeout {
        value: String,
        source: std::num::ParseIntError,
    },

    /// Credentials must be given as `<name>:<secret>`.
    #[error("malformed credentials (expected '<name>:<secret>')")]
    InvalidCredentials,
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// =============================================================================
// Resolution
// =============================================================================

impl ApiConfig {
    /// Resolve configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve configuration from an arbitrary variable source.
    ///
    /// `lookup` returns the value of a named variable, or `None` when the
    /// variable is unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let scheme = lookup(ENV_API_SCHEME).unwrap_or_else(|| DEFAULT_API_SCHEME.to_string());
        let host = lookup(ENV_API_HOST).unwrap_or_else(|| DEFAULT_API_HOST.to_string());

        let version = match lookup(ENV_API_VERSION) {
            None => DEFAULT_API_VERSION,
            Some(v) => parse_version(&v)?,
        };

        let timeout = match lookup(ENV_API_TIMEOUT) {
            None => Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            Some(v) => {
                let secs = v.trim().parse::<u64>().map_err(|source| {
                    ConfigError::InvalidTimeout { value: v, source }
                })?;
                Duration::from_secs(secs)
            }
        };

        let credentials = match lookup(ENV_CREDENTIALS) {
            None => None,
            Some(v) => Some(parse_credentials(&v)?),
        };

        let schema_file = lookup(ENV_SCHEMA_FILE).map(PathBuf::from);
        let commit_on_abandon = parse_flag(lookup(ENV_COMMIT_ON_ABANDON));

        // NDEBUG=1 takes precedence over DEBUG=1
        let debug = parse_flag(lookup(ENV_DEBUG)) && !parse_flag(lookup(ENV_NDEBUG));

        Ok(ApiConfig {
            scheme,
            host,
            version,
            timeout,
            follow_redirects: true,
            accept_encoding: DEFAULT_ACCEPT_ENCODING.to_string(),
            credentials,
            schema_file,
            commit_on_abandon,
            debug,
        })
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            scheme: DEFAULT_API_SCHEME.to_string(),
            host: DEFAULT_API_HOST.to_string(),
            version: DEFAULT_API_VERSION,
            timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            follow_redirects: true,
            accept_encoding: DEFAULT_ACCEPT_ENCODING.to_string(),
            credentials: None,
            schema_file: None,
            commit_on_abandon: false,
            debug: false,
        }
    }
}

fn parse_version(value: &str) -> Result<ApiVersion> {
    match value.trim() {
        "v1" => Ok(ApiVersion::V1),
        "v2" => Ok(ApiVersion::V2),
        other => Err(ConfigError::InvalidVersion(other.to_string())),
    }
}

fn parse_credentials(value: &str) -> Result<Credentials> {
    let (name, secret) = value
        .split_once(':')
        .ok_or(ConfigError::InvalidCredentials)?;
    if name.is_empty() || secret.is_empty() {
        return Err(ConfigError::InvalidCredentials);
    }
    Ok(Credentials {
        name: name.to_string(),
        secret: secret.to_string(),
    })
}

fn parse_flag(value: Option<String>) -> bool {
    match value {
        None => false,
        Some(v) => matches!(v.trim(), "1" | "true" | "yes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.scheme, "https");
        assert_eq!(config.host, "www.data-gator.com");
        assert_eq!(config.version, ApiVersion::V2);
        assert_eq!(config.timeout, Duration::from_secs(180));
        assert!(config.follow_redirects);
        assert!(config.credentials.is_none());
        assert!(!config.commit_on_abandon);
        assert!(!config.debug);
        assert_eq!(config.api_url(), "https://www.data-gator.com/api/v2");
    }

    #[test]
    fn test_environment_overrides() {
        let config = ApiConfig::from_lookup(lookup_from(&[
            ("DATAGATOR_API_HOST", "localhost:8000"),
            ("DATAGATOR_API_SCHEME", "http"),
            ("DATAGATOR_API_VERSION", "v1"),
            ("DATAGATOR_API_TIMEOUT", "30"),
            ("DATAGATOR_COMMIT_ON_ABANDON", "1"),
        ]))
        .unwrap();
        assert_eq!(config.api_url(), "http://localhost:8000/api/v1");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.commit_on_abandon);
    }

    #[test]
    fn test_invalid_version_rejected() {
        let result = ApiConfig::from_lookup(lookup_from(&[("DATAGATOR_API_VERSION", "v3")]));
        assert!(matches!(result, Err(ConfigError::InvalidVersion(v)) if v == "v3"));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let result = ApiConfig::from_lookup(lookup_from(&[("DATAGATOR_API_TIMEOUT", "soon")]));
        assert!(matches!(result, Err(ConfigError::InvalidTimeout { .. })));
    }

    #[test]
    fn test_credentials_parsing() {
        let config = ApiConfig::from_lookup(lookup_from(&[(
            "DATAGATOR_CREDENTIALS",
            "pardee:s3cret",
        )]))
        .unwrap();
        let creds = config.credentials.unwrap();
        assert_eq!(creds.name, "pardee");
        assert_eq!(creds.secret, "s3cret");

        let result = ApiConfig::from_lookup(lookup_from(&[("DATAGATOR_CREDENTIALS", "nosecret")]));
        assert!(matches!(result, Err(ConfigError::InvalidCredentials)));
    }

    #[test]
    fn test_ndebug_overrides_debug() {
        let config =
            ApiConfig::from_lookup(lookup_from(&[("DEBUG", "1"), ("NDEBUG", "1")])).unwrap();
        assert!(!config.debug);

        let config = ApiConfig::from_lookup(lookup_from(&[("DEBUG", "1")])).unwrap();
        assert!(config.debug);
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = Credentials {
            name: "pardee".to_string(),
            secret: "s3cret".to_string(),
        };
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("s3cret"));
    }
}
