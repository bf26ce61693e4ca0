//! HTTP client for DataGator's backend services.
//!
//! [`DataGatorService`] wraps a `reqwest` client configured from
//! [`ApiConfig`] and exposes the verbs of the RESTful API. Every request is
//! addressed relative to the versioned API root; absolute URLs are accepted
//! only when they fall under that root (e.g. `Location` URLs handed back by
//! the backend itself).

use std::sync::{Mutex, PoisonError};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE};
use reqwest::{redirect, Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ApiConfig, Credentials};
use crate::protocol::JSON_MEDIA_TYPE;

// =============================================================================
// Error Types
// =============================================================================

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection, timeout, or protocol failure from the HTTP client.
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// An absolute URL pointing outside the configured API root.
    #[error("unexpected address: '{0}'")]
    ForeignAddress(String),

    /// A configuration value that cannot be carried on the wire.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// =============================================================================
// Payload
// =============================================================================

/// Request body for mutating verbs.
pub enum Payload {
    /// A JSON-serializable document.
    Document(Value),
    /// Pre-serialized JSON bytes, sent verbatim.
    Raw(Bytes),
}

/// One file of a multipart POST: `(field, filename, content)`.
pub struct PostFile {
    /// Form field name.
    pub field: String,
    /// File name reported to the backend.
    pub filename: String,
    /// File content.
    pub content: Bytes,
}

// =============================================================================
// DataGatorService
// =============================================================================

/// HTTP transport facade over the DataGator backend API.
pub struct DataGatorService {
    http: Client,
    base_url: String,
    auth: Mutex<Option<Credentials>>,
}

impl DataGatorService {
    /// Build a service from resolved configuration.
    ///
    /// TLS verification is disabled in debugging mode, i.e. the testbed web
    /// server may not have a domain name matching the official certificate.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, */*"));
        headers.insert(
            ACCEPT_ENCODING,
            HeaderValue::try_from(config.accept_encoding.as_str()).map_err(|_| {
                TransportError::Configuration(format!(
                    "unusable Accept-Encoding value '{}'",
                    config.accept_encoding
                ))
            })?,
        );

        let mut builder = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent())
            .timeout(config.timeout)
            .redirect(if config.follow_redirects {
                redirect::Policy::default()
            } else {
                redirect::Policy::none()
            });

        if config.debug {
            warn!("disabled TLS certificate verification");
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: config.api_url(),
            auth: Mutex::new(config.credentials.clone()),
        })
    }

    /// Install (or clear) credentials for HTTP basic authentication on
    /// mutating requests.
    pub fn set_auth(&self, auth: Option<Credentials>) {
        if auth.is_some() {
            debug!("enabled HTTP authentication");
        }
        *self.auth.lock().unwrap_or_else(PoisonError::into_inner) = auth;
    }

    /// Finalize a request URL relative to the API root.
    ///
    /// Absolute URLs are reduced to their path under the root (ignoring the
    /// HTTP scheme); addresses outside the root are rejected.
    fn request_url(&self, path: &str) -> Result<String> {
        let mut request_uri = path;

        if let Some((_, without_scheme)) = request_uri.split_once("://") {
            let expected_prefix = match self.base_url.split_once("://") {
                Some((_, rest)) => rest,
                None => self.base_url.as_str(),
            };
            match without_scheme.strip_prefix(expected_prefix) {
                Some(rest) => request_uri = rest,
                None => return Err(TransportError::ForeignAddress(path.to_string())),
            }
        }

        let request_uri = request_uri.trim_start_matches('/');
        Ok(format!("{}/{}", self.base_url, request_uri))
    }

    fn authenticated(&self, builder: RequestBuilder) -> RequestBuilder {
        let auth = self.auth.lock().unwrap_or_else(PoisonError::into_inner);
        match &*auth {
            Some(c) => builder.basic_auth(&c.name, Some(&c.secret)),
            None => builder,
        }
    }

    fn json_payload(builder: RequestBuilder, payload: Payload) -> RequestBuilder {
        match payload {
            Payload::Document(value) => builder.json(&value),
            Payload::Raw(bytes) => builder
                .header(CONTENT_TYPE, JSON_MEDIA_TYPE)
                .body(bytes),
        }
    }

    // =========================================================================
    // Verbs
    // =========================================================================

    /// GET a resource under the API root.
    pub async fn get(&self, path: &str, headers: HeaderMap) -> Result<Response> {
        let url = self.request_url(path)?;
        Ok(self.http.get(url).headers(headers).send().await?)
    }

    /// HEAD a resource under the API root.
    pub async fn head(&self, path: &str, headers: HeaderMap) -> Result<Response> {
        let url = self.request_url(path)?;
        Ok(self.http.head(url).headers(headers).send().await?)
    }

    /// DELETE a resource under the API root.
    pub async fn delete(&self, path: &str, headers: HeaderMap) -> Result<Response> {
        let url = self.request_url(path)?;
        Ok(self.http.delete(url).headers(headers).send().await?)
    }

    /// PUT a JSON payload, with basic authentication when configured.
    pub async fn put(&self, path: &str, payload: Payload, headers: HeaderMap) -> Result<Response> {
        let url = self.request_url(path)?;
        let builder = Self::json_payload(self.http.put(url).headers(headers), payload);
        Ok(self.authenticated(builder).send().await?)
    }

    /// PATCH a JSON payload, with basic authentication when configured.
    pub async fn patch(
        &self,
        path: &str,
        payload: Payload,
        headers: HeaderMap,
    ) -> Result<Response> {
        let url = self.request_url(path)?;
        let builder = Self::json_payload(self.http.patch(url).headers(headers), payload);
        Ok(self.authenticated(builder).send().await?)
    }

    /// POST a JSON payload, with basic authentication when configured.
    pub async fn post(&self, path: &str, payload: Payload, headers: HeaderMap) -> Result<Response> {
        let url = self.request_url(path)?;
        let builder = Self::json_payload(self.http.post(url).headers(headers), payload);
        Ok(self.authenticated(builder).send().await?)
    }

    /// POST files as a multipart form, with basic authentication when
    /// configured.
    pub async fn post_files(
        &self,
        path: &str,
        files: Vec<PostFile>,
        headers: HeaderMap,
    ) -> Result<Response> {
        let url = self.request_url(path)?;
        let mut form = reqwest::multipart::Form::new();
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.content.to_vec())
                .file_name(file.filename);
            form = form.part(file.field, part);
        }
        let builder = self.http.post(url).headers(headers).multipart(form);
        Ok(self.authenticated(builder).send().await?)
    }

    // =========================================================================
    // Conveniences
    // =========================================================================

    /// General status of the backend service (GET `/`).
    pub async fn status(&self) -> Result<Value> {
        let response = self.get("/", HeaderMap::new()).await?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// JSON Schema in force at the backend service (GET `/schema`).
    pub async fn schema(&self) -> Result<Value> {
        let response = self.get("/schema", HeaderMap::new()).await?;
        Ok(response.error_for_status()?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ApiConfig {
        let uri = server.uri();
        let (scheme, host) = uri.split_once("://").unwrap();
        ApiConfig {
            scheme: scheme.to_string(),
            host: host.to_string(),
            ..ApiConfig::default()
        }
    }

    #[tokio::test]
    async fn test_get_relative_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/repo1/ds1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "x"})))
            .mount(&server)
            .await;

        let service = DataGatorService::new(&config_for(&server)).unwrap();
        let response = service.get("repo1/ds1", HeaderMap::new()).await.unwrap();
        assert_eq!(response.status(), 200);

        // leading slashes are unified
        let response = service.get("/repo1/ds1", HeaderMap::new()).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_absolute_url_within_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/tasks/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "x"})))
            .mount(&server)
            .await;

        let service = DataGatorService::new(&config_for(&server)).unwrap();
        let absolute = format!("{}/api/v2/tasks/42", server.uri());
        let response = service.get(&absolute, HeaderMap::new()).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_foreign_address_rejected() {
        let server = MockServer::start().await;
        let service = DataGatorService::new(&config_for(&server)).unwrap();
        let result = service
            .get("https://elsewhere.example/api/v2/repo1", HeaderMap::new())
            .await;
        assert!(matches!(result, Err(TransportError::ForeignAddress(_))));
    }

    #[tokio::test]
    async fn test_conditional_get_headers_pass_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/repo1"))
            .and(header("If-None-Match", "\"abc123\""))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;

        let service = DataGatorService::new(&config_for(&server)).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("If-None-Match", HeaderValue::from_static("\"abc123\""));
        let response = service.get("repo1", headers).await.unwrap();
        assert_eq!(response.status(), 304);
    }

    #[tokio::test]
    async fn test_put_attaches_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v2/repo1/ds1"))
            .and(header_exists("authorization"))
            .and(header("content-type", JSON_MEDIA_TYPE))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"kind": "x"})))
            .mount(&server)
            .await;

        let service = DataGatorService::new(&config_for(&server)).unwrap();
        service.set_auth(Some(Credentials {
            name: "repo1".to_string(),
            secret: "s3cret".to_string(),
        }));
        let payload = Payload::Document(json!({"kind": "datagator#DataSet", "name": "ds1"}));
        let response = service
            .put("repo1/ds1", payload, HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
    }

    #[tokio::test]
    async fn test_raw_payload_sent_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v2/repo1/ds1"))
            .and(wiremock::matchers::body_string("{\"k\":1}"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let service = DataGatorService::new(&config_for(&server)).unwrap();
        let response = service
            .patch(
                "repo1/ds1",
                Payload::Raw(Bytes::from_static(b"{\"k\":1}")),
                HeaderMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 202);
    }

    #[tokio::test]
    async fn test_schema_convenience() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/schema"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"type": "object"})),
            )
            .mount(&server)
            .await;

        let service = DataGatorService::new(&config_for(&server)).unwrap();
        let schema = service.schema().await.unwrap();
        assert_eq!(schema, json!({"type": "object"}));
    }
}
