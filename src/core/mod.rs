//! Core egress logic.
//!
//! This module contains:
//! - Endpoint: strict webhook URL validation
//! - Scrub: credential redaction for every sink
//! - Paths: repository coordinate and archive path validation
//! - Fswrite: guarded, atomic filesystem writes
//! - Retry: bounded exponential backoff
//! - Delivery: the client composing all of the above

pub mod delivery;
pub mod endpoint;
pub mod error;
pub mod fswrite;
pub mod paths;
pub mod retry;
pub mod scrub;

// Re-export commonly used types
pub use delivery::{DeliveryClient, DeliveryResult, DeliveryStatus, WebhookMessage};
pub use endpoint::{EndpointDescriptor, WebhookHost};
pub use error::DeliveryError;
pub use fswrite::{OverwritePolicy, WriteIntent};
pub use paths::ArchiveTarget;
pub use retry::{retry_with_backoff, RetryOutcome, RetryPolicy};
