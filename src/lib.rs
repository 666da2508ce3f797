//! mediasend - Secure egress pipeline for generated media
//!
//! Sits between a media-producing application and two external services:
//! a chat webhook (multipart uploads) and a repository content API
//! (archived CDN URL lists). The library decides whether it is safe to
//! send, scrubs anything that escapes the boundary, and delivers
//! resiliently.
//!
//! # Architecture
//!
//! Everything flows through a small number of guarantees:
//! - Destination URLs are validated against a strict allow-list before
//!   any request is made. There is no lenient fallback.
//! - Credential-shaped substrings are redacted from every error, log
//!   line, and derived artifact before it leaves the crate.
//! - Filesystem writes are confined to an expected parent directory,
//!   refuse symlinks, and are atomic (temp sibling + rename).
//! - Transient failures are retried with bounded, cancellable backoff.
//!
//! # Modules
//!
//! - `core`: validation, scrubbing, guarded file writes, retry, delivery
//! - `adapters`: the HTTP transport seam and the reqwest implementation
//! - `config`: layered configuration (env vars, config file, defaults)
//! - `cli`: command-line interface

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;

// Re-export main types at crate root for convenience
pub use crate::core::delivery::{
    ArchiveRequest, Attachment, DeliveryClient, DeliveryResult, DeliveryStatus, WebhookMessage,
};
pub use crate::core::endpoint::{EndpointDescriptor, WebhookHost};
pub use crate::core::error::DeliveryError;
pub use crate::core::fswrite::{OverwritePolicy, WriteIntent};
pub use crate::core::paths::ArchiveTarget;
pub use crate::core::retry::RetryPolicy;
pub use crate::core::scrub::{redact_webhook_url, scrub, REDACTION_MARKER};

pub use crate::adapters::{HttpTransport, ReqwestTransport};
