//! Completion manifest for an upload batch.
//!
//! Records the batch identifier and the absolute path of every file that was
//! part of the run, whatever the outcome of its upload:
//!
//! ```json
//! { "batch": "1700000000000-6f1c...", "files": ["/reports/a.log", "..."] }
//! ```

use super::batch::BatchId;
use crate::fs::FileRecord;
use crate::{Result, UploaderError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub batch: String,
    pub files: Vec<PathBuf>,
}

impl Manifest {
    pub fn new(batch: &BatchId, files: &[FileRecord]) -> Self {
        Self {
            batch: batch.to_string(),
            files: files.iter().map(|f| f.path().to_path_buf()).collect(),
        }
    }

    /// Read a manifest back from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)?;
        Ok(serde_json::from_slice(&content)?)
    }
}

/// Persists the manifest at a fixed location
#[derive(Debug, Clone)]
pub struct ManifestWriter {
    path: PathBuf,
}

impl ManifestWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `manifest`, replacing any previous one.
    ///
    /// The JSON goes to a sibling `.tmp` file first and is renamed into place.
    pub fn write(&self, manifest: &Manifest) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                UploaderError::Manifest(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let json = serde_json::to_vec_pretty(manifest)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, json).map_err(|e| {
            UploaderError::Manifest(format!("cannot write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            UploaderError::Manifest(format!("cannot move manifest to {}: {}", self.path.display(), e))
        })?;

        info!(
            "Wrote manifest for batch {} ({} files) to {}",
            manifest.batch,
            manifest.files.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileKind;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested/dir/upload-info.json");
        let batch = BatchId::generate();
        let files = vec![
            FileRecord::new(PathBuf::from("/reports/a.log"), FileKind::Plain),
            FileRecord::new(PathBuf::from("/reports/s/katalon-analytics-tmp/hars-1.zip"), FileKind::Bundle),
        ];

        ManifestWriter::new(&path).write(&Manifest::new(&batch, &files))?;

        let loaded = Manifest::load(&path)?;
        assert_eq!(loaded.batch, batch.as_str());
        assert_eq!(
            loaded.files,
            vec![
                PathBuf::from("/reports/a.log"),
                PathBuf::from("/reports/s/katalon-analytics-tmp/hars-1.zip")
            ]
        );
        assert!(!temp_dir.path().join("nested/dir/upload-info.json.tmp").exists());
        Ok(())
    }

    #[test]
    fn test_json_shape() -> Result<()> {
        let manifest = Manifest {
            batch: "1-x".to_string(),
            files: vec![PathBuf::from("/a.log")],
        };
        let value: serde_json::Value = serde_json::to_value(&manifest)?;
        assert_eq!(value, serde_json::json!({ "batch": "1-x", "files": ["/a.log"] }));
        Ok(())
    }

    #[test]
    fn test_rewrite_replaces_previous() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let writer = ManifestWriter::new(temp_dir.path().join("upload-info.json"));

        writer.write(&Manifest { batch: "first".to_string(), files: vec![] })?;
        writer.write(&Manifest { batch: "second".to_string(), files: vec![] })?;

        assert_eq!(Manifest::load(writer.path())?.batch, "second");
        Ok(())
    }

    #[test]
    fn test_unwritable_location_is_manifest_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a dir")?;

        let writer = ManifestWriter::new(blocker.join("upload-info.json"));
        let result = writer.write(&Manifest { batch: "b".to_string(), files: vec![] });
        assert!(matches!(result, Err(UploaderError::Manifest(_))));
        Ok(())
    }
}
