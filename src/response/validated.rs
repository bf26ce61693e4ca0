//! Validated access to backend responses.
//!
//! Every read from the backend goes through [`ValidatedResponse::receive`],
//! which enforces the JSON content type, buffers and decodes the body
//! exactly once, validates the document against the backend schema, and
//! checks the HTTP status against the caller's expectations. Anything the
//! gate rejects never reaches the entity layer or the cache.

use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::{HeaderMap, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::protocol::{ErrorEnvelope, JSON_MEDIA_TYPE};
use crate::schema::{SchemaError, SchemaValidator};
use crate::util::{SpooledBuffer, DEFAULT_SPILL_THRESHOLD};

// =============================================================================
// Error Types
// =============================================================================

/// Error type for response validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    /// Wrong content type or malformed JSON body (shape error).
    #[error("invalid response from backend service: {0}")]
    InvalidResponse(String),

    /// The decoded document fails schema validation.
    #[error(transparent)]
    SchemaViolation(#[from] SchemaError),

    /// HTTP status outside the expected set; carries the backend error
    /// envelope's code and message when the body is one.
    #[error("unexpected response from backend service ({code}): {message}")]
    UnexpectedStatus { code: i64, message: String },

    /// Failure while reading the body from the wire.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Failure while spooling the body.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for response validation.
pub type Result<T> = std::result::Result<T, ValidateError>;

// =============================================================================
// ValidatedResponse
// =============================================================================

/// A backend response that passed the validation gate.
#[derive(Debug)]
pub struct ValidatedResponse {
    status: StatusCode,
    headers: HeaderMap,
    raw: Bytes,
    document: Value,
}

impl ValidatedResponse {
    /// Receive and validate a response, expecting one of `expected` status
    /// codes (callers pass `&[StatusCode::OK]` for plain reads).
    pub async fn receive(
        response: Response,
        schema: &SchemaValidator,
        expected: &[StatusCode],
    ) -> Result<Self> {
        Self::receive_spooled(response, schema, expected, DEFAULT_SPILL_THRESHOLD).await
    }

    /// As [`receive`](Self::receive), with a custom spill threshold for the
    /// body buffer.
    pub async fn receive_spooled(
        response: Response,
        schema: &SchemaValidator,
        expected: &[StatusCode],
        spill_threshold: usize,
    ) -> Result<Self> {
        debug!(url = %response.url(), status = %response.status(), "validating response");

        let received = Self::buffer_and_decode(response, schema, spill_threshold).await;
        let validated = match received {
            Ok(v) => v,
            Err(e) => {
                error!("failed response validation: {}", e);
                return Err(e);
            }
        };

        if !expected.contains(&validated.status) {
            // error responses always come with code and message
            let failure = match ErrorEnvelope::from_document(&validated.document) {
                Some(envelope) => ValidateError::UnexpectedStatus {
                    code: envelope.code,
                    message: envelope.message,
                },
                None => ValidateError::UnexpectedStatus {
                    code: validated.status.as_u16() as i64,
                    message: "unexpected response from backend service".to_string(),
                },
            };
            error!("failed response validation: {}", failure);
            return Err(failure);
        }

        Ok(validated)
    }

    async fn buffer_and_decode(
        response: Response,
        schema: &SchemaValidator,
        spill_threshold: usize,
    ) -> Result<Self> {
        // the response body must be a JSON document, regardless of status
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        match content_type.as_deref() {
            Some(JSON_MEDIA_TYPE) => {}
            Some(other) => {
                return Err(ValidateError::InvalidResponse(format!(
                    "unsupported content type '{}'",
                    other
                )))
            }
            None => {
                return Err(ValidateError::InvalidResponse(
                    "missing content type".to_string(),
                ))
            }
        }

        let status = response.status();
        let headers = response.headers().clone();

        // stream-buffer the full body to bound memory for large payloads
        let mut buf = SpooledBuffer::new(spill_threshold);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            buf.write(&chunk?)?;
        }
        let raw = buf.to_bytes()?;
        debug!(size = raw.len(), "decoded size");

        // exactly one decode attempt; every later access reuses it
        let document: Value = serde_json::from_slice(&raw)
            .map_err(|e| ValidateError::InvalidResponse(format!("malformed JSON body: {}", e)))?;

        schema.validate(&document)?;

        Ok(Self {
            status,
            headers,
            raw,
            document,
        })
    }

    /// HTTP status code of the underlying response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// HTTP message headers of the underlying response.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The buffered message body.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// The decoded (and schema-validated) message body.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Consume the response, keeping only the decoded document.
    pub fn into_document(self) -> Value {
        self.document
    }

    /// Whether the backend permits caching this response.
    ///
    /// Only an exact `Cache-Control: no-cache` suppresses caching.
    pub fn cacheable(&self) -> bool {
        match self.headers.get(CACHE_CONTROL).and_then(|v| v.to_str().ok()) {
            Some(value) => value.trim() != "no-cache",
            None => true,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
