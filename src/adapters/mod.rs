//! The HTTP transport seam for external destinations.
//!
//! The delivery client talks to the wire through the `HttpTransport`
//! trait so tests can script replies without a network. `ReqwestTransport`
//! is the production implementation.

pub mod archive;
pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::scrub::scrub;

// Re-export the production transport
pub use http::ReqwestTransport;

/// HTTP method subset the pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

/// One binary part of a multipart upload.
#[derive(Clone)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for FilePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilePart")
            .field("field", &self.field)
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Multipart body: an optional JSON payload plus file parts.
#[derive(Debug, Clone, Default)]
pub struct MultipartBody {
    pub payload_json: Option<String>,
    pub files: Vec<FilePart>,
}

/// A single outbound exchange, transport-agnostic.
#[derive(Clone)]
pub struct EgressRequest {
    pub method: Method,
    pub url: String,
    /// Sent as `Authorization: token <value>`. Never logged.
    pub auth_token: Option<String>,
    pub accept: Option<&'static str>,
    pub json: Option<serde_json::Value>,
    pub multipart: Option<MultipartBody>,
}

impl EgressRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            auth_token: None,
            accept: None,
            json: None,
            multipart: None,
        }
    }
}

impl std::fmt::Debug for EgressRequest {
    // The URL may carry a webhook token and auth_token is a credential,
    // so the derived form would leak both.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EgressRequest")
            .field("method", &self.method)
            .field("url", &scrub(&self.url))
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("json", &self.json.is_some())
            .field("multipart", &self.multipart)
            .finish()
    }
}

/// What came back from the wire. The body is untrusted text.
#[derive(Debug, Clone)]
pub struct EgressReply {
    pub status: u16,
    /// Seconds to wait, from a rate-limit header or body field.
    pub retry_after: Option<f64>,
    pub body: String,
}

impl EgressReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Connection-level failures, before any HTTP status exists.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Other(String),
}

/// Seam between the delivery client and the network.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute one HTTP exchange. Retries happen above this layer.
    async fn execute(&self, request: EgressRequest) -> Result<EgressReply, TransportError>;
}
