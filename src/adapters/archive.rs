//! Repository content API payloads for the CDN URL archive.
//!
//! The archive is a plain text file in the repository listing the CDN
//! location of every delivered attachment. Updates merge with existing
//! entries (duplicates by filename are overwritten) rather than
//! clobbering the file.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::core::paths::ArchiveTarget;
use crate::core::scrub::scrub;

/// Base URL of the content API.
pub const CONTENT_API_BASE: &str = "https://api.github.com";
/// Accept header the content API expects.
pub const CONTENT_API_ACCEPT: &str = "application/vnd.github.v3+json";

const ARCHIVE_HEADER: &str = "# Discord CDN URLs";

/// URL for the contents endpoint of a validated target.
pub fn contents_url(target: &ArchiveTarget) -> String {
    format!(
        "{}/repos/{}/{}/contents/{}",
        CONTENT_API_BASE, target.owner, target.repo, target.file_path
    )
}

#[derive(Debug, Deserialize)]
struct ContentsReply {
    sha: Option<String>,
    content: Option<String>,
}

/// Current revision marker and decoded text of an existing archive file.
#[derive(Debug, Default)]
pub struct ExistingFile {
    pub sha: Option<String>,
    pub content: String,
}

/// Parse a GET reply body into the existing file state. The body is
/// untrusted; anything unparseable is treated as an empty file.
pub fn parse_existing(body: &str) -> ExistingFile {
    let reply: ContentsReply = match serde_json::from_str(body) {
        Ok(reply) => reply,
        Err(_) => return ExistingFile::default(),
    };
    // Content arrives base64-encoded with embedded newlines.
    let content = reply
        .content
        .as_deref()
        .map(|raw| raw.split_whitespace().collect::<String>())
        .and_then(|joined| BASE64.decode(joined).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default();
    ExistingFile {
        sha: reply.sha,
        content,
    }
}

/// Merge new `(filename, url)` pairs into the existing archive text.
/// Existing entries are kept in order; a new entry with a known
/// filename replaces the old URL.
pub fn merge_cdn_urls(existing: &str, new_urls: &[(String, String)]) -> String {
    let mut entries: Vec<(String, String)> = Vec::new();
    for line in existing.lines() {
        let Some((name_part, url)) = line.split_once(": ") else {
            continue;
        };
        if !url.starts_with("https://") {
            continue;
        }
        // Strip the "N. " numbering if present.
        let name = match name_part.split_once(". ") {
            Some((_, rest)) => rest,
            None => name_part,
        };
        entries.push((name.to_string(), url.to_string()));
    }

    for (filename, url) in new_urls {
        match entries.iter_mut().find(|(name, _)| name == filename) {
            Some(entry) => entry.1 = url.clone(),
            None => entries.push((filename.clone(), url.clone())),
        }
    }

    let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
    let mut out = format!("{ARCHIVE_HEADER}\nLast updated: {timestamp}\n\n");
    for (i, (filename, url)) in entries.iter().enumerate() {
        // The archive is a derived artifact that leaves the boundary,
        // so its lines go through the scrubber like any other sink.
        out.push_str(&scrub(&format!("{}. {}: {}\n", i + 1, filename, url)));
    }
    out
}

/// Build the PUT payload that creates or updates the archive file.
pub fn update_payload(
    content: &str,
    sha: Option<&str>,
    commit_message: Option<&str>,
) -> serde_json::Value {
    let message = match commit_message {
        Some(message) => message.to_string(),
        None => format!(
            "Update Discord CDN URLs - {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
        ),
    };
    let mut payload = serde_json::json!({
        "message": message,
        "content": BASE64.encode(content.as_bytes()),
    });
    if let Some(sha) = sha {
        payload["sha"] = serde_json::Value::String(sha.to_string());
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contents_url_for_target() {
        let target = ArchiveTarget::validate("alice/repo", "urls/cdn.md").unwrap();
        assert_eq!(
            contents_url(&target),
            "https://api.github.com/repos/alice/repo/contents/urls/cdn.md"
        );
    }

    #[test]
    fn parse_existing_decodes_base64_content() {
        let encoded = BASE64.encode("1. a.png: https://cdn.example/a.png\n");
        let body = format!(r#"{{"sha": "abc123", "content": "{encoded}"}}"#);
        let existing = parse_existing(&body);
        assert_eq!(existing.sha.as_deref(), Some("abc123"));
        assert!(existing.content.contains("a.png"));
    }

    #[test]
    fn parse_existing_tolerates_garbage() {
        let existing = parse_existing("not json at all");
        assert!(existing.sha.is_none());
        assert!(existing.content.is_empty());
    }

    #[test]
    fn merge_keeps_existing_and_overwrites_duplicates() {
        let existing = "# Discord CDN URLs\nLast updated: old\n\n\
                        1. a.png: https://cdn.example/a-old.png\n\
                        2. b.png: https://cdn.example/b.png\n";
        let merged = merge_cdn_urls(
            existing,
            &[
                ("a.png".to_string(), "https://cdn.example/a-new.png".to_string()),
                ("c.png".to_string(), "https://cdn.example/c.png".to_string()),
            ],
        );
        assert!(merged.contains("1. a.png: https://cdn.example/a-new.png"));
        assert!(merged.contains("2. b.png: https://cdn.example/b.png"));
        assert!(merged.contains("3. c.png: https://cdn.example/c.png"));
        assert!(!merged.contains("a-old"));
    }

    #[test]
    fn update_payload_includes_sha_only_when_known() {
        let with_sha = update_payload("body", Some("abc"), None);
        assert_eq!(with_sha["sha"], "abc");

        let without = update_payload("body", None, Some("custom message"));
        assert!(without.get("sha").is_none());
        assert_eq!(without["message"], "custom message");

        let decoded = BASE64.decode(without["content"].as_str().unwrap()).unwrap();
        assert_eq!(decoded, b"body");
    }
}
