//! Directory traversal for report discovery.
//!
//! Walks a report root recursively and returns the files whose names match a
//! [`FileKind`]. Entries are visited in file-name order within each directory,
//! so two scans of an unchanged tree return the same sequence.
//!
//! A root that is missing or not a directory fails the scan. Anything that
//! cannot be read below the root is logged and skipped.

use super::classify::{FileKind, FileRecord};
use crate::{Result, UploaderError};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Options for directory walking
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Follow symbolic links
    pub follow_links: bool,

    /// Maximum depth (None = unlimited)
    pub max_depth: Option<usize>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            follow_links: false,
            max_depth: None,
        }
    }
}

/// Scan `root` recursively for files of the given kind
///
/// # Arguments
/// * `root` - Root directory to start walking from
/// * `kind` - Classification every returned file must match
///
/// # Returns
/// * `Ok(Vec<FileRecord>)` - Matching files with absolute paths
/// * `Err(UploaderError::Scan)` - If the root cannot be read
pub fn scan_files(root: &Path, kind: FileKind) -> Result<Vec<FileRecord>> {
    scan_files_with_options(root, kind, &WalkOptions::default())
}

pub fn scan_files_with_options(
    root: &Path,
    kind: FileKind,
    options: &WalkOptions,
) -> Result<Vec<FileRecord>> {
    let root = absolute_root(root)?;
    if !root.is_dir() {
        return Err(UploaderError::Scan(format!(
            "{} is not a readable directory",
            root.display()
        )));
    }

    let mut walker = WalkDir::new(&root)
        .follow_links(options.follow_links)
        .sort_by_file_name();

    if let Some(max_depth) = options.max_depth {
        walker = walker.max_depth(max_depth);
    }

    let mut files = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if kind.matches(&entry.file_name().to_string_lossy()) {
            files.push(FileRecord::new(entry.into_path(), kind));
        }
    }

    Ok(files)
}

fn absolute_root(root: &Path) -> Result<PathBuf> {
    if root.is_absolute() {
        Ok(root.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(files: &[FileRecord]) -> Vec<String> {
        files.iter().map(|f| f.file_name()).collect()
    }

    #[test]
    fn test_scan_empty_directory() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let files = scan_files(temp_dir.path(), FileKind::Plain)?;
        assert!(files.is_empty());
        Ok(())
    }

    #[test]
    fn test_scan_separates_plain_and_har() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        fs::create_dir_all(root.join("session/run/net"))?;
        fs::write(root.join("a.log"), b"log")?;
        fs::write(root.join("b.zip"), b"zip")?;
        fs::write(root.join("session/run/net/page1.har"), b"{}")?;
        fs::write(root.join("session/run/net/PAGE2.HAR"), b"{}")?;
        fs::write(root.join("session/run/execution0.log"), b"log")?;

        let plain = scan_files(root, FileKind::Plain)?;
        assert_eq!(names(&plain), vec!["a.log", "execution0.log"]);
        assert!(plain.iter().all(|f| f.kind() == FileKind::Plain));
        assert!(plain.iter().all(|f| f.path().is_absolute()));

        let hars = scan_files(root, FileKind::Har)?;
        assert_eq!(names(&hars), vec!["PAGE2.HAR", "page1.har"]);
        assert_eq!(hars[0].parent(), root.join("session/run/net"));

        Ok(())
    }

    #[test]
    fn test_scan_is_stable_across_calls() -> Result<()> {
        let temp_dir = TempDir::new()?;
        for name in ["c.log", "a.log", "b.txt"] {
            fs::write(temp_dir.path().join(name), b"x")?;
        }

        let first = scan_files(temp_dir.path(), FileKind::Plain)?;
        let second = scan_files(temp_dir.path(), FileKind::Plain)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_max_depth_limits_recursion() -> Result<()> {
        let temp_dir = TempDir::new()?;
        fs::create_dir(temp_dir.path().join("deep"))?;
        fs::write(temp_dir.path().join("top.log"), b"x")?;
        fs::write(temp_dir.path().join("deep/nested.log"), b"x")?;

        let options = WalkOptions {
            max_depth: Some(1),
            ..WalkOptions::default()
        };
        let files = scan_files_with_options(temp_dir.path(), FileKind::Plain, &options)?;
        assert_eq!(names(&files), vec!["top.log"]);
        Ok(())
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("does-not-exist");
        assert!(matches!(
            scan_files(&missing, FileKind::Plain),
            Err(UploaderError::Scan(_))
        ));
    }
}
