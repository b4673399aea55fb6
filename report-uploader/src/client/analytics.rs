//! HTTP client for the analytics service.
//!
//! Implements token exchange, upload URL allocation, streamed file transfer
//! and file info registration on top of `reqwest`.

use super::retry::{ErrorKind, RetryDecision, RetryPolicy};
use super::{Authenticator, FileInfo, RemoteUploader, UploadDestination, UploadInfoAllocator};
use crate::config::AnalyticsConfig;
use crate::transfer::progress::format_bytes;
use crate::transfer::length_check::LengthCheckedStream;
use crate::{Result, UploaderError};
use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

const TOKEN_PATH: &str = "/oauth/token";
const UPLOAD_URLS_PATH: &str = "/api/v1/files/upload-urls";
const FILE_INFO_PATH: &str = "/api/v1/katalon/test-reports";

/// OAuth client credentials of the uploader application.
const CLIENT_ID: &str = "kit_uploader";
const CLIENT_SECRET: &str = "kit_uploader";

const REPORT_TYPE: &str = "katalon";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// One failed transfer attempt, classified for the retry policy
struct TransferFailure {
    kind: ErrorKind,
    error: UploaderError,
}

impl From<reqwest::Error> for TransferFailure {
    fn from(e: reqwest::Error) -> Self {
        Self {
            kind: ErrorKind::from_reqwest(&e),
            error: UploaderError::Http(e),
        }
    }
}

impl From<std::io::Error> for TransferFailure {
    fn from(e: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Other,
            error: UploaderError::Io(e),
        }
    }
}

/// Analytics service client
#[derive(Debug, Clone)]
pub struct AnalyticsClient {
    http: reqwest::Client,
    server_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl AnalyticsClient {
    pub fn new(config: &AnalyticsConfig, retry: RetryPolicy) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout())
            .user_agent(concat!("report-uploader/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            server_url: config.server_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    /// Single PUT of the file body, bounded by the request timeout.
    /// Returns the number of bytes sent.
    async fn put_file(&self, upload_url: &str, path: &Path) -> std::result::Result<u64, TransferFailure> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let stream = LengthCheckedStream::new(ReaderStream::new(file), size);

        let resp = self
            .http
            .put(upload_url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(stream))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            Ok(size)
        } else {
            let error_text = resp.text().await.unwrap_or_default();
            Err(TransferFailure {
                kind: ErrorKind::from_status(status),
                error: UploaderError::Upload(format!(
                    "upload of {} failed: {} - {}",
                    path.display(),
                    status,
                    error_text
                )),
            })
        }
    }
}

#[async_trait]
impl Authenticator for AnalyticsClient {
    async fn request_token(&self, email: &str, password: &str) -> Result<String> {
        let resp = self
            .http
            .post(self.url(TOKEN_PATH))
            .basic_auth(CLIENT_ID, Some(CLIENT_SECRET))
            .form(&[
                ("username", email),
                ("password", password),
                ("grant_type", "password"),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UploaderError::Authentication(format!(
                "token request rejected with status {}",
                status
            )));
        }

        let token: TokenResponse = resp.json().await?;
        Ok(token.access_token.unwrap_or_default())
    }
}

#[async_trait]
impl UploadInfoAllocator for AnalyticsClient {
    async fn get_upload_infos(
        &self,
        token: &str,
        project_id: i64,
        count: usize,
    ) -> Result<Vec<UploadDestination>> {
        let resp = self
            .http
            .get(self.url(UPLOAD_URLS_PATH))
            .bearer_auth(token)
            .query(&[
                ("projectId", project_id.to_string()),
                ("numberUrl", count.to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            return Err(UploaderError::Allocation(format!(
                "upload URL request failed: {} - {}",
                status, error_text
            )));
        }

        Ok(resp.json::<Vec<UploadDestination>>().await?)
    }
}

#[async_trait]
impl RemoteUploader for AnalyticsClient {
    async fn upload_file_with_retry(&self, upload_url: &str, path: &Path) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.put_file(upload_url, path).await {
                Ok(bytes) => {
                    debug!("Uploaded {} ({})", path.display(), format_bytes(bytes));
                    return Ok(());
                }
                Err(failure) => match self.retry.decide(attempt, failure.kind) {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(
                            "Upload of {} failed (attempt {}/{}): {}. Retrying in {:?}",
                            path.display(),
                            attempt,
                            self.retry.max_attempts,
                            failure.error,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::NoRetry => return Err(failure.error),
                },
            }
        }
    }

    async fn upload_file_info(&self, info: &FileInfo) -> Result<()> {
        let resp = self
            .http
            .post(self.url(FILE_INFO_PATH))
            .bearer_auth(&info.token)
            .query(&[
                ("projectId", info.project_id.to_string()),
                ("batch", info.batch.clone()),
                ("folderPath", info.folder_path.clone()),
                ("fileName", info.file_name.clone()),
                ("uploadedPath", info.uploaded_path.clone()),
                ("isEnd", info.is_end.to_string()),
                ("reportType", REPORT_TYPE.to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            if info.is_end {
                info!("Registered last file of batch {}", info.batch);
            }
            Ok(())
        } else {
            let error_text = resp.text().await.unwrap_or_default();
            Err(UploaderError::Upload(format!(
                "file info for {} rejected: {} - {}",
                info.file_name, status, error_text
            )))
        }
    }
}
