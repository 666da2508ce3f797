//! Resilient delivery client composing the validators, the scrubber,
//! and the transport.
//!
//! Per call the state machine is Pending -> Attempting -> {Delivered |
//! Retrying | Failed}; the retry loop lives in `core::retry`. Endpoint
//! and archive-target validation always run before any request is made
//! (fail closed), and every error detail or log line produced here has
//! been through the scrubber.

use serde_json::Value;

use crate::adapters::{
    archive, EgressReply, EgressRequest, FilePart, HttpTransport, Method, MultipartBody,
    TransportError,
};
use crate::core::endpoint::{self, EndpointDescriptor};
use crate::core::error::DeliveryError;
use crate::core::paths::ArchiveTarget;
use crate::core::retry::{retry_with_backoff, RetryPolicy};
use crate::core::scrub::scrub;

/// Chat platform message length cap.
pub const MAX_MESSAGE_LENGTH: usize = 2000;
/// Attachments accepted per webhook request; larger sets are chunked.
pub const MAX_FILES_PER_REQUEST: usize = 10;
/// Per-file upload cap (25MB).
pub const MAX_FILE_SIZE: usize = 25 * 1024 * 1024;

/// How much untrusted response body to keep in an error detail.
const MAX_ERROR_BODY: usize = 500;

/// Terminal state of a delivery call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    PartiallyDelivered,
    Failed,
}

/// Outcome handed back to the media pipeline.
///
/// `remote_ids` are identifiers echoed by the remote service (CDN
/// URLs). They are untrusted strings: never reuse them as write targets
/// or execution inputs without re-validation.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub remote_ids: Vec<String>,
}

/// One binary attachment supplied by the media pipeline. Bytes are
/// borrowed for the duration of the call only.
#[derive(Clone)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Message payload for the chat webhook.
#[derive(Debug, Clone, Default)]
pub struct WebhookMessage {
    pub content: Option<String>,
    pub embeds: Vec<Value>,
    pub attachments: Vec<Attachment>,
}

/// Parameters for an archive update. The token lives here for the call
/// only and goes out exclusively in the Authorization header.
#[derive(Clone)]
pub struct ArchiveRequest {
    pub owner_repo: String,
    pub file_path: String,
    pub token: String,
    pub commit_message: Option<String>,
}

impl std::fmt::Debug for ArchiveRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveRequest")
            .field("owner_repo", &self.owner_repo)
            .field("file_path", &self.file_path)
            .field("token", &"[REDACTED]")
            .field("commit_message", &self.commit_message)
            .finish()
    }
}

/// Content type for an attachment, by extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "json" => "application/json",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

fn truncate_message(content: &str) -> String {
    if content.chars().count() <= MAX_MESSAGE_LENGTH {
        return content.to_string();
    }
    let truncated: String = content.chars().take(MAX_MESSAGE_LENGTH - 3).collect();
    format!("{truncated}...")
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

/// The retrying client for both destinations.
pub struct DeliveryClient<T: HttpTransport> {
    transport: T,
}

impl<T: HttpTransport> DeliveryClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport_ref(&self) -> &T {
        &self.transport
    }

    /// Deliver a message (text, embeds, attachments) to a webhook.
    ///
    /// The raw URL is validated first; a `Validation` error is returned
    /// before any request goes out. Transport-level outcomes, including
    /// terminal failures, are reported through the result's status. An
    /// attachment over the upload size limit is skipped and the status
    /// is at best `PartiallyDelivered`.
    pub async fn send_webhook(
        &self,
        raw_url: &str,
        message: &WebhookMessage,
        policy: &RetryPolicy,
    ) -> Result<DeliveryResult, DeliveryError> {
        let (result, _) = self.send_webhook_inner(raw_url, message, policy).await?;
        Ok(result)
    }

    /// Deliver to the webhook and, when attachments were acknowledged
    /// with CDN URLs, record them in the repository archive.
    ///
    /// An acknowledgment that echoes no URLs (e.g. a bare 204) means
    /// there is no new artifact to record, so the archive step is
    /// skipped rather than re-sending a stale URL list.
    pub async fn deliver_and_archive(
        &self,
        raw_url: &str,
        message: &WebhookMessage,
        archive_request: Option<&ArchiveRequest>,
        policy: &RetryPolicy,
    ) -> Result<DeliveryResult, DeliveryError> {
        let (mut result, cdn_urls) = self.send_webhook_inner(raw_url, message, policy).await?;

        let Some(request) = archive_request else {
            return Ok(result);
        };
        if result.status == DeliveryStatus::Failed {
            return Ok(result);
        }
        if cdn_urls.is_empty() {
            tracing::info!("no attachment URLs echoed back; skipping archive update");
            return Ok(result);
        }

        match self.update_archive(request, &cdn_urls, policy).await {
            Ok(archived) => {
                result.attempts += archived.attempts;
                if archived.status != DeliveryStatus::Delivered {
                    result.status = DeliveryStatus::PartiallyDelivered;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "archive update failed");
                result.status = DeliveryStatus::PartiallyDelivered;
            }
        }
        Ok(result)
    }

    async fn send_webhook_inner(
        &self,
        raw_url: &str,
        message: &WebhookMessage,
        policy: &RetryPolicy,
    ) -> Result<(DeliveryResult, Vec<(String, String)>), DeliveryError> {
        let target = endpoint::validate(raw_url)?;

        let mut usable: Vec<&Attachment> = Vec::new();
        let mut skipped = 0usize;
        for attachment in &message.attachments {
            if attachment.bytes.is_empty() {
                return Err(DeliveryError::Validation {
                    reason: format!("attachment {:?} is empty", attachment.filename),
                });
            }
            if attachment.bytes.len() > MAX_FILE_SIZE {
                tracing::warn!(
                    filename = %attachment.filename,
                    size = attachment.bytes.len(),
                    "skipping attachment over the upload size limit"
                );
                skipped += 1;
                continue;
            }
            usable.push(attachment);
        }

        let has_text = message.content.as_deref().is_some_and(|c| !c.is_empty())
            || !message.embeds.is_empty();
        if usable.is_empty() && !has_text {
            return Err(DeliveryError::Validation {
                reason: "nothing to send: no message text and no usable attachments".to_string(),
            });
        }

        // One request per chunk of attachments; text and embeds ride on
        // the first request only.
        let chunks: Vec<&[&Attachment]> = if usable.is_empty() {
            vec![&usable[0..0]]
        } else {
            usable.chunks(MAX_FILES_PER_REQUEST).collect()
        };

        let mut total_attempts = 0;
        let mut delivered = 0usize;
        let mut failed = 0usize;
        let mut cdn_urls: Vec<(String, String)> = Vec::new();

        for (index, chunk) in chunks.iter().enumerate() {
            let payload = build_payload(message, index == 0);
            let body = build_multipart(&payload, chunk);

            let outcome = retry_with_backoff(policy, || {
                self.attempt_webhook(&target, body.clone())
            })
            .await;

            total_attempts += outcome.attempts;
            match outcome.result {
                Ok(pairs) => {
                    delivered += 1;
                    cdn_urls.extend(pairs);
                }
                Err(err) => {
                    failed += 1;
                    tracing::warn!(
                        destination = %target.redacted(),
                        error = %err,
                        "webhook request failed"
                    );
                }
            }
        }

        let status = if failed == 0 && skipped == 0 {
            DeliveryStatus::Delivered
        } else if delivered > 0 {
            DeliveryStatus::PartiallyDelivered
        } else {
            DeliveryStatus::Failed
        };

        let remote_ids = cdn_urls.iter().map(|(_, url)| url.clone()).collect();
        Ok((
            DeliveryResult {
                status,
                attempts: total_attempts,
                remote_ids,
            },
            cdn_urls,
        ))
    }

    async fn attempt_webhook(
        &self,
        target: &EndpointDescriptor,
        body: MultipartBody,
    ) -> Result<Vec<(String, String)>, DeliveryError> {
        let mut request = EgressRequest::new(Method::Post, target.canonical_url());
        request.multipart = Some(body);

        let reply = self.transport.execute(request).await.map_err(from_transport)?;
        classify_reply(&reply)?;
        Ok(extract_cdn_urls(&reply.body))
    }

    /// Record `(filename, url)` pairs in the repository archive file.
    ///
    /// Coordinates are validated before any remote call; the content
    /// API is never trusted to do it for us.
    pub async fn update_archive(
        &self,
        request: &ArchiveRequest,
        cdn_urls: &[(String, String)],
        policy: &RetryPolicy,
    ) -> Result<DeliveryResult, DeliveryError> {
        let target = ArchiveTarget::validate(&request.owner_repo, &request.file_path)?;
        if cdn_urls.is_empty() {
            return Err(DeliveryError::Validation {
                reason: "no CDN URLs to archive".to_string(),
            });
        }

        let url = archive::contents_url(&target);

        let fetch = retry_with_backoff(policy, || {
            self.attempt_archive_get(&url, &request.token)
        })
        .await;
        let mut total_attempts = fetch.attempts;
        let existing = match fetch.result {
            Ok(existing) => existing,
            Err(err) => {
                tracing::warn!(target = %target.slug(), error = %err, "archive fetch failed");
                return Ok(DeliveryResult {
                    status: DeliveryStatus::Failed,
                    attempts: total_attempts,
                    remote_ids: Vec::new(),
                });
            }
        };

        let content = archive::merge_cdn_urls(&existing.content, cdn_urls);
        let payload = archive::update_payload(
            &content,
            existing.sha.as_deref(),
            request.commit_message.as_deref(),
        );

        let put = retry_with_backoff(policy, || {
            self.attempt_archive_put(&url, &request.token, payload.clone())
        })
        .await;
        total_attempts += put.attempts;

        match put.result {
            Ok(()) => {
                tracing::info!(
                    target = %target.slug(),
                    urls = cdn_urls.len(),
                    "archive updated"
                );
                Ok(DeliveryResult {
                    status: DeliveryStatus::Delivered,
                    attempts: total_attempts,
                    remote_ids: Vec::new(),
                })
            }
            Err(err) => {
                tracing::warn!(target = %target.slug(), error = %err, "archive update failed");
                Ok(DeliveryResult {
                    status: DeliveryStatus::Failed,
                    attempts: total_attempts,
                    remote_ids: Vec::new(),
                })
            }
        }
    }

    async fn attempt_archive_get(
        &self,
        url: &str,
        token: &str,
    ) -> Result<archive::ExistingFile, DeliveryError> {
        let mut request = EgressRequest::new(Method::Get, url);
        request.auth_token = Some(token.to_string());
        request.accept = Some(archive::CONTENT_API_ACCEPT);

        let reply = self.transport.execute(request).await.map_err(from_transport)?;
        if reply.status == 404 {
            // File doesn't exist yet; the PUT will create it.
            return Ok(archive::ExistingFile::default());
        }
        classify_reply(&reply)?;
        Ok(archive::parse_existing(&reply.body))
    }

    async fn attempt_archive_put(
        &self,
        url: &str,
        token: &str,
        payload: Value,
    ) -> Result<(), DeliveryError> {
        let mut request = EgressRequest::new(Method::Put, url);
        request.auth_token = Some(token.to_string());
        request.accept = Some(archive::CONTENT_API_ACCEPT);
        request.json = Some(payload);

        let reply = self.transport.execute(request).await.map_err(from_transport)?;
        classify_reply(&reply)?;
        Ok(())
    }
}

fn build_payload(message: &WebhookMessage, first_chunk: bool) -> Option<String> {
    if !first_chunk {
        return None;
    }
    let mut payload = serde_json::Map::new();
    if let Some(content) = message.content.as_deref() {
        if !content.is_empty() {
            payload.insert("content".to_string(), Value::String(truncate_message(content)));
        }
    }
    if !message.embeds.is_empty() {
        payload.insert("embeds".to_string(), Value::Array(message.embeds.clone()));
    }
    if payload.is_empty() {
        None
    } else {
        Some(Value::Object(payload).to_string())
    }
}

fn build_multipart(payload_json: &Option<String>, chunk: &[&Attachment]) -> MultipartBody {
    MultipartBody {
        payload_json: payload_json.clone(),
        files: chunk
            .iter()
            .enumerate()
            .map(|(i, attachment)| FilePart {
                field: format!("file{i}"),
                filename: attachment.filename.clone(),
                content_type: content_type_for(&attachment.filename).to_string(),
                bytes: attachment.bytes.clone(),
            })
            .collect(),
    }
}

fn from_transport(err: TransportError) -> DeliveryError {
    DeliveryError::Transient {
        detail: scrub(&err.to_string()),
    }
}

/// Map an HTTP reply to the error taxonomy. Success statuses pass.
fn classify_reply(reply: &EgressReply) -> Result<(), DeliveryError> {
    if reply.is_success() {
        return Ok(());
    }
    let detail = scrub(&truncate_body(&reply.body));
    match reply.status {
        429 => Err(DeliveryError::RateLimited {
            retry_after_secs: reply.retry_after.unwrap_or(1.0),
        }),
        401 | 403 => Err(DeliveryError::Auth {
            status: reply.status,
            detail,
        }),
        400..=499 => Err(DeliveryError::Rejected {
            status: reply.status,
            detail,
        }),
        500..=599 => Err(DeliveryError::Transient { detail }),
        _ => Err(DeliveryError::Rejected {
            status: reply.status,
            detail,
        }),
    }
}

/// Pull `(filename, url)` pairs from an acknowledgment body. The body
/// is untrusted; anything unparseable simply yields no pairs.
fn extract_cdn_urls(body: &str) -> Vec<(String, String)> {
    if body.is_empty() {
        return Vec::new();
    }
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    let Some(attachments) = json.get("attachments").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    attachments
        .iter()
        .filter_map(|entry| {
            let filename = entry.get("filename")?.as_str()?;
            let url = entry.get("url")?.as_str()?;
            Some((filename.to_string(), url.to_string()))
        })
        .collect()
}
