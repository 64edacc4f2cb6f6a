//! Utility functions for file names and path manipulation

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Characters that are illegal in file names on at least one common filesystem
const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Longest file name component produced, in bytes, leaving room for an extension
const MAX_COMPONENT_BYTES: usize = 200;

/// Turn remote metadata (a title, an artist) into a single safe path component
///
/// Path separators and characters illegal on common filesystems become `_`,
/// control characters are dropped, surrounding whitespace and dots are
/// trimmed. A result that would be empty, `.` or `..` becomes `_`.
///
/// # Examples
///
/// ```
/// use music_downloader::utils::sanitize_component;
///
/// assert_eq!(sanitize_component("AC/DC"), "AC_DC");
/// assert_eq!(sanitize_component("What?"), "What_");
/// assert_eq!(sanitize_component(".."), "_");
/// ```
#[must_use]
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let trimmed = replaced.trim().trim_matches('.').trim();

    let mut result = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        if result.len() + c.len_utf8() > MAX_COMPONENT_BYTES {
            break;
        }
        result.push(c);
    }

    if result.is_empty() {
        "_".to_string()
    } else {
        result
    }
}

/// Decide which path to write to when `path` may already exist
///
/// # Returns
///
/// - `Overwrite`: `Some(path)` unchanged
/// - `Skip`: `None` if the file exists, otherwise `Some(path)`
/// - `Rename`: `Some(path)` if free, otherwise the first free
///   `stem (N).ext` next to it
///
/// # Examples
///
/// ```
/// use music_downloader::utils::get_unique_path;
/// use music_downloader::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/Artist - Song.mp3");
/// let unique = get_unique_path(path, FileCollisionAction::Rename).unwrap();
/// // If the file exists, returns Some("/tmp/Artist - Song (1).mp3")
/// ```
pub fn get_unique_path(path: &Path, action: FileCollisionAction) -> Result<Option<PathBuf>> {
    match action {
        FileCollisionAction::Overwrite => Ok(Some(path.to_path_buf())),
        FileCollisionAction::Skip => {
            if path.exists() {
                Ok(None)
            } else {
                Ok(Some(path.to_path_buf()))
            }
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(Some(path.to_path_buf()));
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                Error::Other(format!("cannot extract file stem from {}", path.display()))
            })?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().ok_or_else(|| {
                Error::Other(format!("cannot extract parent of {}", path.display()))
            })?;

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(Some(new_path));
                }
            }

            Err(Error::Other(format!(
                "could not find a free file name for {} after {} attempts",
                path.display(),
                MAX_RENAME_ATTEMPTS
            )))
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_replaces_separators_and_illegal_chars() {
        assert_eq!(sanitize_component("AC/DC"), "AC_DC");
        assert_eq!(sanitize_component(r"a\b"), "a_b");
        assert_eq!(sanitize_component("Who: \"Me\"?"), "Who_ _Me__");
        assert_eq!(sanitize_component("tab\there"), "tabhere");
    }

    #[test]
    fn test_sanitize_never_escapes_directory() {
        assert_eq!(sanitize_component(".."), "_");
        assert_eq!(sanitize_component("."), "_");
        assert_eq!(sanitize_component("   "), "_");
        assert_eq!(sanitize_component("../../etc/passwd"), "_.._etc_passwd");
        assert!(!sanitize_component("../x").contains('/'));
    }

    #[test]
    fn test_sanitize_keeps_unicode_and_limits_length() {
        assert_eq!(sanitize_component("Björk – Jóga"), "Björk – Jóga");

        let long = "é".repeat(500);
        let cut = sanitize_component(&long);
        assert!(cut.len() <= MAX_COMPONENT_BYTES);
        assert!(cut.chars().all(|c| c == 'é'), "cut on a char boundary");
    }

    #[test]
    fn test_get_unique_path_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("song.mp3");

        for action in [
            FileCollisionAction::Rename,
            FileCollisionAction::Overwrite,
            FileCollisionAction::Skip,
        ] {
            assert_eq!(get_unique_path(&path, action).unwrap(), Some(path.clone()));
        }
    }

    #[test]
    fn test_get_unique_path_rename_sequential() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("song.mp3");

        fs::write(&path, "original").unwrap();
        let unique = get_unique_path(&path, FileCollisionAction::Rename)
            .unwrap()
            .unwrap();
        assert_eq!(unique, temp_dir.path().join("song (1).mp3"));

        fs::write(&unique, "first rename").unwrap();
        let unique2 = get_unique_path(&path, FileCollisionAction::Rename)
            .unwrap()
            .unwrap();
        assert_eq!(unique2, temp_dir.path().join("song (2).mp3"));
    }

    #[test]
    fn test_get_unique_path_rename_keeps_dotted_stem() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1. Intro.mp3");
        fs::write(&path, "original").unwrap();

        let unique = get_unique_path(&path, FileCollisionAction::Rename)
            .unwrap()
            .unwrap();
        assert_eq!(unique, temp_dir.path().join("1. Intro (1).mp3"));
    }

    #[test]
    fn test_get_unique_path_overwrite_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("song.mp3");
        fs::write(&path, "original").unwrap();

        let result = get_unique_path(&path, FileCollisionAction::Overwrite).unwrap();
        assert_eq!(result, Some(path));
    }

    #[test]
    fn test_get_unique_path_skip_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("song.mp3");
        fs::write(&path, "original").unwrap();

        let result = get_unique_path(&path, FileCollisionAction::Skip).unwrap();
        assert_eq!(result, None);
    }
}
