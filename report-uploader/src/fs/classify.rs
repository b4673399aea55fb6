//! File classification by case-insensitive file name suffix.

use std::path::{Path, PathBuf};

/// Suffixes that never count as plain log files.
const NON_PLAIN_SUFFIXES: &[&str] = &[".", ".zip", ".har"];

const HAR_SUFFIX: &str = ".har";
const ZIP_SUFFIX: &str = ".zip";

/// What a discovered file is, for upload purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Raw log or data file, uploaded as-is
    Plain,
    /// HAR capture, bundled before upload
    Har,
    /// Zip archive produced from a group of HAR captures
    Bundle,
}

impl FileKind {
    /// Whether a file name belongs to this kind.
    pub fn matches(&self, file_name: &str) -> bool {
        let name = file_name.to_ascii_lowercase();
        match self {
            FileKind::Plain => !NON_PLAIN_SUFFIXES.iter().any(|s| name.ends_with(s)),
            FileKind::Har => name.ends_with(HAR_SUFFIX),
            FileKind::Bundle => name.ends_with(ZIP_SUFFIX),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Plain => "plain",
            FileKind::Har => "har",
            FileKind::Bundle => "bundle",
        }
    }
}

/// A file selected for the batch. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    path: PathBuf,
    parent: PathBuf,
    kind: FileKind,
}

impl FileRecord {
    /// `path` should already be absolute; the scanner and bundler guarantee it.
    pub fn new(path: PathBuf, kind: FileKind) -> Self {
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self { path, parent, kind }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parent(&self) -> &Path {
        &self.parent
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    /// Base file name, lossily converted for the remote API.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_excludes_archives_captures_and_trailing_dot() {
        assert!(FileKind::Plain.matches("execution0.log"));
        assert!(FileKind::Plain.matches("JUnit_Report.xml"));
        assert!(FileKind::Plain.matches("console"));
        assert!(!FileKind::Plain.matches("b.zip"));
        assert!(!FileKind::Plain.matches("B.ZIP"));
        assert!(!FileKind::Plain.matches("page1.har"));
        assert!(!FileKind::Plain.matches("Page1.HaR"));
        assert!(!FileKind::Plain.matches("weird."));
    }

    #[test]
    fn test_har_is_case_insensitive() {
        assert!(FileKind::Har.matches("page1.har"));
        assert!(FileKind::Har.matches("PAGE1.HAR"));
        assert!(!FileKind::Har.matches("page1.har.log"));
        assert!(!FileKind::Har.matches("har"));
    }

    #[test]
    fn test_record_parent_and_name() {
        let record = FileRecord::new(PathBuf::from("/reports/run1/a.log"), FileKind::Plain);
        assert_eq!(record.parent(), Path::new("/reports/run1"));
        assert_eq!(record.file_name(), "a.log");
        assert_eq!(record.kind(), FileKind::Plain);
    }
}
