//! Configuration types for the DataGator client.
//!
//! This module defines the structures used to represent client configuration
//! as resolved from the process environment.

use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Primitive Types
// =============================================================================

/// Version of the backend API protocol.
///
/// The protocol version decides the verb used to commit change-sets:
/// `v2` commits with PATCH, the legacy `v1` protocol with PUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    /// Legacy protocol; change-sets are committed with PUT.
    V1,
    /// Current protocol; change-sets are committed with PATCH.
    V2,
}

impl ApiVersion {
    /// Path segment of this version, e.g. `"v2"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
        }
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository principal and its write secret, used for HTTP basic
/// authentication on mutating requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Repository (account) name.
    pub name: String,
    /// Write secret.
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    // The secret never appears in logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("name", &self.name)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// ApiConfig
// =============================================================================

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `http` or `https`.
    pub scheme: String,
    /// Domain name or IP address of the backend service portal.
    pub host: String,
    /// Backend API protocol version.
    pub version: ApiVersion,
    /// Timeout applied to every HTTP request.
    pub timeout: Duration,
    /// Whether to follow server-side redirects.
    pub follow_redirects: bool,
    /// Encodings advertised to the backend (favors gzip over identity).
    pub accept_encoding: String,
    /// Default credentials, if sourced from the environment.
    pub credentials: Option<Credentials>,
    /// Local schema document to use instead of fetching `/schema`.
    pub schema_file: Option<PathBuf>,
    /// Whether a dropped change-set writer makes one best-effort commit
    /// attempt for its unflushed entries instead of discarding them.
    pub commit_on_abandon: bool,
    /// Debugging mode; disables TLS certificate verification so the client
    /// can talk to a testbed server without a matching certificate.
    pub debug: bool,
}

impl ApiConfig {
    /// URL prefix of all RESTful API endpoints.
    pub fn api_url(&self) -> String {
        format!("{}://{}/api/{}", self.scheme, self.host, self.version)
    }

    /// `User-Agent` request header value (see RFC 2616).
    pub fn user_agent(&self) -> String {
        format!("datagator-api-client (rust/{})", env!("CARGO_PKG_VERSION"))
    }
}
