//! Remote collaborators of an upload run.
//!
//! The executor only talks to the analytics service through the three traits
//! below. [`analytics::AnalyticsClient`] implements all of them over HTTP;
//! tests substitute mocks.

pub mod analytics;
pub mod retry;

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[cfg(test)]
use mockall::automock;

pub use analytics::AnalyticsClient;
pub use retry::RetryPolicy;

/// Where one file goes: a pre-signed upload URL and the logical remote path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDestination {
    pub upload_url: String,
    pub path: String,
}

/// Metadata registered for a file once its bytes are uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub project_id: i64,
    pub batch: String,
    pub folder_path: String,
    pub file_name: String,
    pub uploaded_path: String,
    /// True only for the last file of the batch
    pub is_end: bool,
    pub token: String,
}

/// Exchanges credentials for an access token.
///
/// An empty token means the credentials were rejected.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn request_token(&self, email: &str, password: &str) -> Result<String>;
}

/// Hands out one destination per file, in the caller's order.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UploadInfoAllocator: Send + Sync {
    async fn get_upload_infos(
        &self,
        token: &str,
        project_id: i64,
        count: usize,
    ) -> Result<Vec<UploadDestination>>;
}

/// Transfers file bytes and registers file metadata.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteUploader: Send + Sync {
    /// Upload the file at `path` to `upload_url`, retrying transient failures.
    async fn upload_file_with_retry(&self, upload_url: &str, path: &Path) -> Result<()>;

    /// Register the uploaded file with the analytics service.
    async fn upload_file_info(&self, info: &FileInfo) -> Result<()>;
}
