//! Path Security Integration Tests
//!
//! Repository coordinates and archive paths are validated before any
//! remote call; traversal sequences must never reach the content API.

use mediasend::{ArchiveTarget, DeliveryError};

#[test]
fn accepts_wellformed_targets() {
    let target = ArchiveTarget::validate("alice/repo", "docs/cdn_urls.md").unwrap();
    assert_eq!(target.owner, "alice");
    assert_eq!(target.repo, "repo");
    assert_eq!(target.file_path, "docs/cdn_urls.md");

    assert!(ArchiveTarget::validate("my-org/my_repo.wiki", "a/b/c.txt").is_ok());
    assert!(ArchiveTarget::validate("u.ser/repo-2", "cdn_urls.md").is_ok());
}

#[test]
fn rejects_traversal_in_owner_repo() {
    let cases = [
        "alice/repo/../../bob/other",
        "../repo",
        "alice/..",
        "a..b/repo",
        "alice/re..po",
    ];
    for case in cases {
        assert!(
            matches!(
                ArchiveTarget::validate(case, "file.md"),
                Err(DeliveryError::Validation { .. })
            ),
            "accepted {case}"
        );
    }
}

#[test]
fn rejects_wrong_separator_counts() {
    assert!(ArchiveTarget::validate("justonename", "file.md").is_err());
    assert!(ArchiveTarget::validate("a/b/c", "file.md").is_err());
    assert!(ArchiveTarget::validate("", "file.md").is_err());
    assert!(ArchiveTarget::validate("/", "file.md").is_err());
    assert!(ArchiveTarget::validate("alice/", "file.md").is_err());
    assert!(ArchiveTarget::validate("/repo", "file.md").is_err());
}

#[test]
fn rejects_disallowed_characters() {
    assert!(ArchiveTarget::validate("alice$/repo", "file.md").is_err());
    assert!(ArchiveTarget::validate("alice/repo name", "file.md").is_err());
    assert!(ArchiveTarget::validate("ali\tce/repo", "file.md").is_err());
}

#[test]
fn rejects_traversal_in_file_path() {
    let cases = [
        "../../etc/passwd",
        "docs/../../../secret",
        "./file.md",
        "docs/./file.md",
    ];
    for case in cases {
        assert!(
            ArchiveTarget::validate("alice/repo", case).is_err(),
            "accepted {case}"
        );
    }
}

#[test]
fn rejects_absolute_and_structurally_invalid_file_paths() {
    assert!(ArchiveTarget::validate("alice/repo", "/etc/passwd").is_err());
    assert!(ArchiveTarget::validate("alice/repo", "").is_err());
    assert!(ArchiveTarget::validate("alice/repo", "a//b").is_err());
    assert!(ArchiveTarget::validate("alice/repo", "trailing/").is_err());
    assert!(ArchiveTarget::validate("alice/repo", "dir\\file").is_err());
    assert!(ArchiveTarget::validate("alice/repo", "nul\0byte").is_err());
    assert!(ArchiveTarget::validate("alice/repo", "ctrl\x07char").is_err());
}

#[test]
fn valid_inputs_pass_through_unchanged() {
    // The validator accepts or rejects; it never rewrites.
    let target = ArchiveTarget::validate("Alice.B/Repo_1", "Sub.Dir/File-Name.md").unwrap();
    assert_eq!(target.slug(), "Alice.B/Repo_1");
    assert_eq!(target.file_path, "Sub.Dir/File-Name.md");
}
