//! Guarded filesystem writes for locally saved media.
//!
//! Every write is confined to an expected parent directory, refuses to
//! go through a symlink, and lands atomically: bytes are written to a
//! temporary sibling which is then renamed into place, so a crash
//! mid-write never leaves a truncated file at the final path. The
//! temporary file is removed on every exit path by its RAII guard.
//!
//! The existence check and the rename are not a single OS transaction;
//! a check-to-use race on a shared output directory is an accepted
//! residual risk, mitigated by the symlink rejection.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::core::error::DeliveryError;

/// What to do when a regular file already exists at the target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Pick the next free `stem_00001.ext` style name.
    #[default]
    Disambiguate,
    /// Replace the existing file in place.
    Overwrite,
}

/// A requested filesystem mutation, checked before any byte is written.
#[derive(Debug, Clone)]
pub struct WriteIntent {
    /// Where the caller wants the file.
    pub target_path: PathBuf,
    /// Directory the resolved target must stay inside.
    pub expected_parent: PathBuf,
    /// Collision behavior for regular files. Symlinks are rejected
    /// regardless of this setting.
    pub overwrite: OverwritePolicy,
}

impl WriteIntent {
    pub fn new(
        target_path: impl Into<PathBuf>,
        expected_parent: impl Into<PathBuf>,
        overwrite: OverwritePolicy,
    ) -> Self {
        Self {
            target_path: target_path.into(),
            expected_parent: expected_parent.into(),
            overwrite,
        }
    }
}

fn io_err(path: &Path, source: std::io::Error) -> DeliveryError {
    DeliveryError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// Write `bytes` according to `intent`, returning the path actually
/// written.
pub fn write(intent: &WriteIntent, bytes: &[u8]) -> Result<PathBuf, DeliveryError> {
    let parent = intent.target_path.parent().ok_or_else(|| {
        DeliveryError::PathTraversal {
            path: intent.target_path.clone(),
        }
    })?;
    let file_name = intent.target_path.file_name().ok_or_else(|| {
        DeliveryError::PathTraversal {
            path: intent.target_path.clone(),
        }
    })?;

    // Writing through a symlinked directory would redirect the whole
    // operation, so the immediate parent must be a real directory.
    if is_symlink(parent) {
        return Err(DeliveryError::Symlink {
            path: parent.to_path_buf(),
        });
    }

    let expected = fs::canonicalize(&intent.expected_parent)
        .map_err(|e| io_err(&intent.expected_parent, e))?;
    let canonical_parent = fs::canonicalize(parent).map_err(|e| io_err(parent, e))?;
    if !canonical_parent.starts_with(&expected) {
        return Err(DeliveryError::PathTraversal {
            path: intent.target_path.clone(),
        });
    }

    let mut target = canonical_parent.join(file_name);
    match fs::symlink_metadata(&target) {
        Ok(meta) if meta.file_type().is_symlink() => {
            return Err(DeliveryError::Symlink { path: target });
        }
        Ok(_) if intent.overwrite == OverwritePolicy::Disambiguate => {
            target = next_free_path(&canonical_parent, file_name.to_string_lossy().as_ref())?;
        }
        _ => {}
    }

    let mut tmp = NamedTempFile::new_in(&canonical_parent).map_err(|e| io_err(&target, e))?;
    tmp.write_all(bytes).map_err(|e| io_err(&target, e))?;
    tmp.flush().map_err(|e| io_err(&target, e))?;
    tmp.persist(&target)
        .map_err(|e| io_err(&target, e.error))?;

    Ok(target)
}

/// Find the next unoccupied `stem_00001.ext` name in `dir`.
fn next_free_path(dir: &Path, file_name: &str) -> Result<PathBuf, DeliveryError> {
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (file_name, String::new()),
    };

    for counter in 1..=99_999u32 {
        let candidate = dir.join(format!("{stem}_{counter:05}{ext}"));
        if fs::symlink_metadata(&candidate).is_err() {
            return Ok(candidate);
        }
    }

    Err(io_err(
        &dir.join(file_name),
        std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "no free disambiguated name",
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn intent(dir: &TempDir, name: &str, overwrite: OverwritePolicy) -> WriteIntent {
        WriteIntent::new(dir.path().join(name), dir.path(), overwrite)
    }

    #[test]
    fn writes_new_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&intent(&dir, "out.png", OverwritePolicy::Disambiguate), b"abc").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"abc");
        assert_eq!(path.file_name().unwrap(), "out.png");
    }

    #[test]
    fn disambiguates_existing_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("out.png"), b"first").unwrap();

        let path = write(&intent(&dir, "out.png", OverwritePolicy::Disambiguate), b"second").unwrap();
        assert_eq!(path.file_name().unwrap(), "out_00001.png");
        assert_eq!(fs::read(dir.path().join("out.png")).unwrap(), b"first");
    }

    #[test]
    fn overwrite_replaces_regular_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("out.png"), b"first").unwrap();

        let path = write(&intent(&dir, "out.png", OverwritePolicy::Overwrite), b"second").unwrap();
        assert_eq!(path.file_name().unwrap(), "out.png");
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_target_even_with_overwrite() {
        let dir = TempDir::new().unwrap();
        let victim = dir.path().join("victim.txt");
        fs::write(&victim, b"original").unwrap();
        std::os::unix::fs::symlink(&victim, dir.path().join("out.png")).unwrap();

        for policy in [OverwritePolicy::Disambiguate, OverwritePolicy::Overwrite] {
            let result = write(&intent(&dir, "out.png", policy), b"attack");
            assert!(matches!(result, Err(DeliveryError::Symlink { .. })));
        }
        assert_eq!(fs::read(&victim).unwrap(), b"original");
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlinked_parent_directory() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        let linked = dir.path().join("linked");
        std::os::unix::fs::symlink(&real, &linked).unwrap();

        let result = write(
            &WriteIntent::new(
                linked.join("out.png"),
                dir.path(),
                OverwritePolicy::Disambiguate,
            ),
            b"abc",
        );
        assert!(matches!(result, Err(DeliveryError::Symlink { .. })));
    }

    #[test]
    fn rejects_escape_from_expected_parent() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();

        let result = write(
            &WriteIntent::new(
                outside.path().join("out.png"),
                dir.path(),
                OverwritePolicy::Disambiguate,
            ),
            b"abc",
        );
        assert!(matches!(result, Err(DeliveryError::PathTraversal { .. })));
    }

    #[test]
    fn rejects_dotdot_traversal() {
        let dir = TempDir::new().unwrap();
        let inner = dir.path().join("inner");
        fs::create_dir(&inner).unwrap();

        let result = write(
            &WriteIntent::new(
                inner.join("..").join("..").join("out.png"),
                &inner,
                OverwritePolicy::Disambiguate,
            ),
            b"abc",
        );
        assert!(matches!(result, Err(DeliveryError::PathTraversal { .. })));
    }

    #[test]
    fn leaves_no_temp_files_behind() {
        let dir = TempDir::new().unwrap();
        write(&intent(&dir, "out.png", OverwritePolicy::Disambiguate), b"abc").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("out.png")]);
    }
}
