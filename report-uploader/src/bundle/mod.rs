//! HAR capture bundling.
//!
//! HAR files are grouped by the capture session they belong to and each group
//! is packed into one zip archive under the session directory:
//!
//! ```text
//! <session>/<run>/<net>/page1.har   ─┐
//! <session>/<run>/<net>/page2.har   ─┴─> <session>/katalon-analytics-tmp/hars-<epoch-millis>.zip
//! ```
//!
//! The session is the directory three levels above the HAR file. Entries are
//! stored flat under their base file name, so two captures with the same name
//! collide and the one seen last wins.
//!
//! A failing group is logged and skipped; the other groups are still bundled.

use crate::fs::{FileKind, FileRecord};
use crate::{Result, UploaderError};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Number of `parent()` hops from a HAR file to its session directory.
pub const HAR_SESSION_DEPTH: usize = 3;

/// Scratch directory created inside each session directory.
pub const SCRATCH_DIR_NAME: &str = "katalon-analytics-tmp";

/// HAR files sharing one session directory, in first-seen order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarGroup {
    pub key: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Session directory of a HAR file, or `None` when the path is too shallow.
pub fn session_key(har_file: &Path) -> Option<&Path> {
    har_file.ancestors().nth(HAR_SESSION_DEPTH)
}

/// Group HAR files by session, preserving first-seen order of keys and files.
pub fn group_by_session(har_files: &[FileRecord]) -> Vec<HarGroup> {
    let mut groups: Vec<HarGroup> = Vec::new();

    for record in har_files {
        let Some(key) = session_key(record.path()) else {
            warn!(
                "Skipping HAR file without a session directory: {}",
                record.path().display()
            );
            continue;
        };

        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.files.push(record.path().to_path_buf()),
            None => groups.push(HarGroup {
                key: key.to_path_buf(),
                files: vec![record.path().to_path_buf()],
            }),
        }
    }

    groups
}

/// Packs HAR captures into per-session zip archives
#[derive(Debug, Clone)]
pub struct HarBundler {
    scratch_dir_name: String,
}

impl Default for HarBundler {
    fn default() -> Self {
        Self {
            scratch_dir_name: SCRATCH_DIR_NAME.to_string(),
        }
    }
}

impl HarBundler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bundle every session group, returning one [`FileKind::Bundle`] record per
    /// archive written. Groups that fail contribute nothing.
    pub fn bundle(&self, har_files: &[FileRecord]) -> Vec<FileRecord> {
        let groups = group_by_session(har_files);
        info!(
            "Bundling {} HAR files into {} session archives",
            har_files.len(),
            groups.len()
        );

        let mut archives = Vec::with_capacity(groups.len());
        for group in &groups {
            match self.bundle_group(group) {
                Ok(archive) => {
                    info!(
                        "Bundled {} HAR files into {}",
                        group.files.len(),
                        archive.display()
                    );
                    archives.push(FileRecord::new(archive, FileKind::Bundle));
                }
                Err(e) => {
                    error!("Cannot zip HAR files for {}: {}", group.key.display(), e);
                }
            }
        }

        archives
    }

    /// Write one archive for `group` into its scratch directory.
    pub fn bundle_group(&self, group: &HarGroup) -> Result<PathBuf> {
        let scratch_dir = group.key.join(&self.scratch_dir_name);
        std::fs::create_dir_all(&scratch_dir)?;

        let (archive_path, archive_file) = create_archive_file(&scratch_dir)?;

        if let Err(e) = write_archive(&group.files, archive_file) {
            if let Err(cleanup) = std::fs::remove_file(&archive_path) {
                warn!(
                    "Failed to remove partial archive {}: {}",
                    archive_path.display(),
                    cleanup
                );
            }
            return Err(e);
        }

        Ok(archive_path)
    }
}

/// Claim a fresh `hars-<epoch-millis>.zip` in `dir`, waiting for the next
/// millisecond if the name is already taken.
fn create_archive_file(dir: &Path) -> Result<(PathBuf, File)> {
    loop {
        let millis = chrono::Utc::now().timestamp_millis();
        let path = dir.join(format!("hars-{}.zip", millis));

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Flat entry names for `files`; a repeated base name replaces the earlier file.
fn archive_entries(files: &[PathBuf]) -> Result<Vec<(String, &Path)>> {
    let mut entries: Vec<(String, &Path)> = Vec::with_capacity(files.len());

    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| UploaderError::Bundle(format!("{} has no file name", file.display())))?;

        match entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => {
                warn!(
                    "Duplicate HAR entry name {}: {} replaces {}",
                    name,
                    file.display(),
                    entry.1.display()
                );
                entry.1 = file;
            }
            None => entries.push((name, file)),
        }
    }

    Ok(entries)
}

/// Stream every file into a zip written to `out`.
pub fn write_archive(files: &[PathBuf], out: File) -> Result<()> {
    let entries = archive_entries(files)?;
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(BufWriter::new(out));

    for (name, path) in entries {
        let mut source = BufReader::new(File::open(path)?);
        zip.start_file(name.as_str(), options)?;
        let copied = io::copy(&mut source, &mut zip)?;
        debug!("Added {} ({} bytes) to archive", path.display(), copied);
    }

    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn har(root: &Path, rel: &str, body: &[u8]) -> FileRecord {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        FileRecord::new(path, FileKind::Har)
    }

    fn read_entries(archive: &Path) -> Vec<(String, Vec<u8>)> {
        let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut entry = zip.by_index(i).unwrap();
                let mut body = Vec::new();
                entry.read_to_end(&mut body).unwrap();
                (entry.name().to_string(), body)
            })
            .collect()
    }

    #[test]
    fn test_session_key_is_three_levels_up() {
        let key = session_key(Path::new("/reports/session/run/net/page1.har"));
        assert_eq!(key, Some(Path::new("/reports/session")));
        assert_eq!(session_key(Path::new("/page1.har")), None);
    }

    #[test]
    fn test_two_level_layout_groups_under_parent_of_session() {
        let key = session_key(Path::new("/reports/session/net/page1.har"));
        assert_eq!(key, Some(Path::new("/reports")));
    }

    #[test]
    fn test_grouping_preserves_first_seen_order() {
        let files: Vec<FileRecord> = [
            "/r/s2/run/net/b.har",
            "/r/s1/run/net/a.har",
            "/r/s2/run/other/c.har",
        ]
        .iter()
        .map(|p| FileRecord::new(PathBuf::from(p), FileKind::Har))
        .collect();

        let groups = group_by_session(&files);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, PathBuf::from("/r/s2"));
        assert_eq!(
            groups[0].files,
            vec![
                PathBuf::from("/r/s2/run/net/b.har"),
                PathBuf::from("/r/s2/run/other/c.har")
            ]
        );
        assert_eq!(groups[1].key, PathBuf::from("/r/s1"));
    }

    #[test]
    fn test_same_session_produces_one_archive_with_all_contents() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let files = vec![
            har(root, "session/run/net/page1.har", b"{\"log\":1}"),
            har(root, "session/run/net/page2.har", b"{\"log\":2}"),
        ];

        let archives = HarBundler::new().bundle(&files);
        assert_eq!(archives.len(), 1);

        let archive = archives[0].path();
        assert_eq!(archives[0].kind(), FileKind::Bundle);
        assert_eq!(archive.parent().unwrap(), root.join("session").join(SCRATCH_DIR_NAME));
        let name = archives[0].file_name();
        assert!(name.starts_with("hars-") && name.ends_with(".zip"), "{}", name);

        assert_eq!(
            read_entries(archive),
            vec![
                ("page1.har".to_string(), b"{\"log\":1}".to_vec()),
                ("page2.har".to_string(), b"{\"log\":2}".to_vec()),
            ]
        );
    }

    #[test]
    fn test_different_sessions_produce_separate_archives() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let files = vec![
            har(root, "s1/run/net/a.har", b"a"),
            har(root, "s2/run/net/b.har", b"b"),
        ];

        let archives = HarBundler::new().bundle(&files);
        assert_eq!(archives.len(), 2);
        assert!(archives[0].path().starts_with(root.join("s1")));
        assert!(archives[1].path().starts_with(root.join("s2")));
    }

    #[test]
    fn test_duplicate_names_last_file_wins() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let files = vec![
            har(root, "session/run/first/page.har", b"first"),
            har(root, "session/run/second/page.har", b"second"),
        ];

        let archives = HarBundler::new().bundle(&files);
        assert_eq!(
            read_entries(archives[0].path()),
            vec![("page.har".to_string(), b"second".to_vec())]
        );
    }

    #[test]
    fn test_failed_group_does_not_stop_others() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("broken/run/net")).unwrap();
        let missing = FileRecord::new(root.join("broken/run/net/gone.har"), FileKind::Har);
        let files = vec![missing, har(root, "ok/run/net/a.har", b"a")];

        let archives = HarBundler::new().bundle(&files);
        assert_eq!(archives.len(), 1);
        assert!(archives[0].path().starts_with(root.join("ok")));

        let leftovers = fs::read_dir(root.join("broken").join(SCRATCH_DIR_NAME))
            .unwrap()
            .count();
        assert_eq!(leftovers, 0, "partial archive should be removed");
    }

    #[test]
    fn test_repeated_bundling_reuses_scratch_dir_without_overwriting() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let files = vec![har(root, "session/run/net/a.har", b"a")];
        let bundler = HarBundler::new();

        let first = bundler.bundle(&files);
        let second = bundler.bundle(&files);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0].path(), second[0].path());
        assert!(first[0].path().exists());
    }
}
