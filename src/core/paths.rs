//! Structural validation for repository coordinates and archive paths.
//!
//! These checks run strictly before any remote call; the content API is
//! never trusted to reject a malformed path on our behalf.

use serde::{Deserialize, Serialize};

use crate::core::error::DeliveryError;

/// A validated (repository, file path) pair for the content API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveTarget {
    pub owner: String,
    pub repo: String,
    pub file_path: String,
}

impl ArchiveTarget {
    /// Validate an `owner/repo` string and a file path within the repo.
    ///
    /// The combined form must match `^[\w.-]+/[\w.-]+$` with exactly one
    /// separator and no `..` anywhere; the file path must not climb
    /// above the archive root.
    pub fn validate(owner_repo: &str, file_path: &str) -> Result<Self, DeliveryError> {
        let (owner, repo) = split_owner_repo(owner_repo)?;
        validate_file_path(file_path)?;
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            file_path: file_path.to_string(),
        })
    }

    /// `owner/repo` display form.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

fn invalid(reason: String) -> DeliveryError {
    DeliveryError::Validation { reason }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn split_owner_repo(owner_repo: &str) -> Result<(&str, &str), DeliveryError> {
    let mut parts = owner_repo.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if valid_name(owner) && valid_name(repo) => {
            Ok((owner, repo))
        }
        _ => Err(invalid(format!(
            "invalid repository format: {owner_repo:?}; expected owner/repo"
        ))),
    }
}

fn validate_file_path(file_path: &str) -> Result<(), DeliveryError> {
    if file_path.is_empty() {
        return Err(invalid("archive file path is empty".to_string()));
    }
    if file_path.starts_with('/') {
        return Err(invalid(format!(
            "archive file path must be relative: {file_path:?}"
        )));
    }
    if file_path.contains('\\') || file_path.chars().any(|c| c.is_control()) {
        return Err(invalid(format!(
            "archive file path contains invalid characters: {file_path:?}"
        )));
    }
    for segment in file_path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(invalid(format!(
                "archive file path contains an unsafe segment: {file_path:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_coordinates() {
        let target = ArchiveTarget::validate("alice/repo", "urls/cdn_links.md").unwrap();
        assert_eq!(target.owner, "alice");
        assert_eq!(target.repo, "repo");
        assert_eq!(target.slug(), "alice/repo");
    }

    #[test]
    fn accepts_dots_and_dashes_in_names() {
        assert!(ArchiveTarget::validate("my-org.x/some_repo-2", "file.md").is_ok());
    }

    #[test]
    fn rejects_multiple_separators() {
        assert!(ArchiveTarget::validate("alice/repo/../../bob/other", "file.md").is_err());
        assert!(ArchiveTarget::validate("a/b/c", "file.md").is_err());
    }

    #[test]
    fn rejects_missing_separator_and_empty_sides() {
        assert!(ArchiveTarget::validate("alicerepo", "file.md").is_err());
        assert!(ArchiveTarget::validate("/repo", "file.md").is_err());
        assert!(ArchiveTarget::validate("alice/", "file.md").is_err());
    }

    #[test]
    fn rejects_dotdot_in_names() {
        assert!(ArchiveTarget::validate("ali..ce/repo", "file.md").is_err());
        assert!(ArchiveTarget::validate("../repo", "file.md").is_err());
    }

    #[test]
    fn rejects_characters_outside_allowed_set() {
        assert!(ArchiveTarget::validate("alice!/repo", "file.md").is_err());
        assert!(ArchiveTarget::validate("alice/re po", "file.md").is_err());
    }

    #[test]
    fn rejects_traversal_in_file_path() {
        assert!(ArchiveTarget::validate("alice/repo", "../../etc/passwd").is_err());
        assert!(ArchiveTarget::validate("alice/repo", "docs/../secret").is_err());
    }

    #[test]
    fn rejects_absolute_and_malformed_file_paths() {
        assert!(ArchiveTarget::validate("alice/repo", "/etc/passwd").is_err());
        assert!(ArchiveTarget::validate("alice/repo", "").is_err());
        assert!(ArchiveTarget::validate("alice/repo", "a//b").is_err());
        assert!(ArchiveTarget::validate("alice/repo", "dir\\file").is_err());
        assert!(ArchiveTarget::validate("alice/repo", "file\0name").is_err());
    }
}
