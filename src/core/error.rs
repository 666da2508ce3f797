//! Error taxonomy for the egress pipeline.
//!
//! Every `detail` string carried by these variants has already been
//! passed through the secret scrubber at construction time, so the
//! `Display` form is safe to log or surface to callers as-is.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the egress pipeline.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Malformed or disallowed endpoint/path. Never retried.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// Credential rejected by the remote service. Never retried.
    #[error("authentication rejected (status {status}): {detail}")]
    Auth { status: u16, detail: String },

    /// Remote service asked us to back off. Retried with the
    /// server-provided delay.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64 },

    /// Request rejected with a non-auth client error. Never retried.
    #[error("request rejected (status {status}): {detail}")]
    Rejected { status: u16, detail: String },

    /// Connection-level or 5xx failure. Retried with backoff.
    #[error("transient failure: {detail}")]
    Transient { detail: String },

    /// Retry budget spent without success.
    #[error("retries exhausted after {attempts} attempts: {detail}")]
    ExhaustedRetries { attempts: u32, detail: String },

    /// Target (or its parent directory) is a symbolic link. Writing
    /// through it would follow attacker-controlled indirection.
    #[error("refusing to write through symlink: {path}")]
    Symlink { path: PathBuf },

    /// Resolved path escapes the permitted parent directory.
    #[error("path escapes permitted directory: {path}")]
    PathTraversal { path: PathBuf },

    /// Local filesystem failure.
    #[error("filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeliveryError {
    /// Whether another attempt at the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeliveryError::RateLimited { .. } | DeliveryError::Transient { .. }
        )
    }

    /// Server-provided delay hint, which takes precedence over the
    /// computed backoff.
    pub fn retry_after_hint(&self) -> Option<Duration> {
        match self {
            DeliveryError::RateLimited { retry_after_secs } => {
                Some(Duration::from_secs_f64(retry_after_secs.max(0.0)))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_classification() {
        assert!(DeliveryError::Transient {
            detail: "connection reset".into()
        }
        .is_retryable());
        assert!(DeliveryError::RateLimited {
            retry_after_secs: 1.5
        }
        .is_retryable());

        assert!(!DeliveryError::Validation {
            reason: "bad url".into()
        }
        .is_retryable());
        assert!(!DeliveryError::Auth {
            status: 401,
            detail: "invalid token".into()
        }
        .is_retryable());
        assert!(!DeliveryError::Rejected {
            status: 400,
            detail: "bad payload".into()
        }
        .is_retryable());
    }

    #[test]
    fn rate_limit_hint_is_clamped_to_zero() {
        let err = DeliveryError::RateLimited {
            retry_after_secs: -2.0,
        };
        assert_eq!(err.retry_after_hint(), Some(Duration::ZERO));
    }
}
