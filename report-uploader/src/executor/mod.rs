//! Upload executor - Orchestrates one upload run.
//!
//! This module ties together:
//! - Authentication against the analytics service
//! - HAR bundling and plain file discovery
//! - Upload URL allocation for the whole batch
//! - Bounded parallel uploads with a full barrier
//! - The completion manifest
//!
//! The ordered file list is built once (plain files first, HAR bundles
//! appended) and is the single index space shared by destination allocation,
//! dispatch and the end-of-batch flag.

pub mod batch;
pub mod manifest;

use crate::bundle::HarBundler;
use crate::client::{Authenticator, FileInfo, RemoteUploader, UploadDestination, UploadInfoAllocator};
use crate::config::Config;
use crate::fs::{scan_files, FileKind, FileRecord};
use crate::transfer::progress::ProgressCounter;
use crate::{Result, UploaderError};
use batch::{BatchContext, BatchId};
use manifest::{Manifest, ManifestWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default size of the upload worker pool.
pub const DEFAULT_MAX_WORKERS: usize = 32;

/// Everything one run needs, read from configuration before it starts
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub root: PathBuf,
    pub email: String,
    pub password: String,
    pub project_id: i64,
    pub manifest_path: PathBuf,
    pub max_workers: usize,
}

impl UploadJob {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root: config.upload.path.clone(),
            email: config.analytics.email.clone(),
            password: config.analytics.password.clone(),
            project_id: config.analytics.project_id,
            manifest_path: config.upload.upload_info_file_path.clone(),
            max_workers: config.upload.max_workers,
        }
    }
}

/// Result of uploading one file of the batch
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub index: usize,
    pub path: PathBuf,
    pub result: std::result::Result<(), String>,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub batch: BatchId,
    pub total: usize,
    /// One entry per file, in list order
    pub outcomes: Vec<UploadOutcome>,
    pub interrupted: bool,
    pub manifest_written: bool,
}

impl UploadReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Per-run values every upload task reads
struct BatchMeta {
    project_id: i64,
    batch: String,
    token: String,
}

/// Main upload executor
pub struct UploadExecutor {
    authenticator: Arc<dyn Authenticator>,
    allocator: Arc<dyn UploadInfoAllocator>,
    uploader: Arc<dyn RemoteUploader>,
    bundler: HarBundler,
    interrupt: CancellationToken,
}

impl UploadExecutor {
    /// Create a new executor that is never interrupted
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        allocator: Arc<dyn UploadInfoAllocator>,
        uploader: Arc<dyn RemoteUploader>,
    ) -> Self {
        Self {
            authenticator,
            allocator,
            uploader,
            bundler: HarBundler::new(),
            interrupt: CancellationToken::new(),
        }
    }

    /// Stop waiting for uploads once `interrupt` fires.
    ///
    /// In-flight uploads are left running; the manifest is still written.
    pub fn with_interrupt(mut self, interrupt: CancellationToken) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Execute an upload run
    pub async fn execute(&self, job: &UploadJob) -> Result<UploadReport> {
        let token = self.authenticate(job).await?;

        info!("Uploading log files in folder path: {}", job.root.display());
        let files = self.collect_files(&job.root).await?;

        let ctx = BatchContext::new(BatchId::generate(), files.len());
        info!(
            "Batch {}: {} files to upload with {} workers",
            ctx.batch(),
            ctx.total(),
            job.max_workers
        );

        let files = Arc::new(files);
        let (outcomes, interrupted) = if files.is_empty() {
            info!("No files found under {}", job.root.display());
            (Vec::new(), false)
        } else {
            let destinations = self.allocate(&token, job.project_id, files.len()).await?;
            let meta = Arc::new(BatchMeta {
                project_id: job.project_id,
                batch: ctx.batch().to_string(),
                token,
            });
            let handles = self.dispatch(&ctx, &files, destinations, meta, job.max_workers);
            self.wait_all(&files, handles).await
        };

        let manifest_written = match ManifestWriter::new(&job.manifest_path)
            .write(&Manifest::new(ctx.batch(), &files))
        {
            Ok(()) => true,
            Err(e) => {
                error!("Cannot write manifest {}: {}", job.manifest_path.display(), e);
                false
            }
        };

        let report = UploadReport {
            batch: ctx.batch().clone(),
            total: ctx.total(),
            outcomes,
            interrupted,
            manifest_written,
        };

        info!(
            "Batch {} finished: {} of {} files uploaded, {} failed",
            report.batch,
            report.succeeded(),
            report.total,
            report.failed().count()
        );
        for failure in report.failed() {
            if let Err(e) = &failure.result {
                warn!("Not uploaded: {} ({})", failure.path.display(), e);
            }
        }

        if interrupted {
            return Err(UploaderError::Interrupted);
        }
        Ok(report)
    }

    async fn authenticate(&self, job: &UploadJob) -> Result<String> {
        let token = match self.authenticator.request_token(&job.email, &job.password).await {
            Ok(token) => token,
            Err(e) => {
                error!("Cannot get the access token - please check your credentials and network: {}", e);
                return Err(match e {
                    UploaderError::Authentication(msg) => UploaderError::Authentication(msg),
                    other => UploaderError::Authentication(other.to_string()),
                });
            }
        };

        if token.trim().is_empty() {
            error!("Cannot get the access token - please check your credentials and network");
            return Err(UploaderError::Authentication("empty access token".to_string()));
        }
        Ok(token)
    }

    /// Bundle HAR captures, scan plain files, and return `plain ++ bundles`.
    async fn collect_files(&self, root: &Path) -> Result<Vec<FileRecord>> {
        let root = root.to_path_buf();
        let bundler = self.bundler.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<FileRecord>> {
            let hars = scan_files(&root, FileKind::Har)?;
            let bundles = bundler.bundle(&hars);

            let mut files = scan_files(&root, FileKind::Plain)?;
            info!(
                "Found {} plain files and {} HAR bundles",
                files.len(),
                bundles.len()
            );
            files.extend(bundles);
            Ok(files)
        })
        .await
        .map_err(|e| UploaderError::Scan(format!("file discovery task failed: {}", e)))?
    }

    async fn allocate(
        &self,
        token: &str,
        project_id: i64,
        count: usize,
    ) -> Result<Vec<UploadDestination>> {
        let destinations = self
            .allocator
            .get_upload_infos(token, project_id, count)
            .await
            .map_err(|e| {
                error!("Cannot get upload URLs for {} files: {}", count, e);
                e
            })?;

        if destinations.len() != count {
            error!(
                "Upload URL count mismatch: requested {}, received {}",
                count,
                destinations.len()
            );
            return Err(UploaderError::Allocation(format!(
                "requested {} upload destinations, received {}",
                count,
                destinations.len()
            )));
        }
        Ok(destinations)
    }

    /// Spawn one task per file; at most `max_workers` run at once.
    fn dispatch(
        &self,
        ctx: &BatchContext,
        files: &Arc<Vec<FileRecord>>,
        destinations: Vec<UploadDestination>,
        meta: Arc<BatchMeta>,
        max_workers: usize,
    ) -> Vec<JoinHandle<Result<()>>> {
        let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
        let progress = Arc::new(ProgressCounter::new(ctx.total()));
        let destinations = Arc::new(destinations);
        let total = ctx.total();

        (0..total)
            .map(|index| {
                let is_end = ctx.is_end(index);
                let sem = Arc::clone(&semaphore);
                let files = Arc::clone(files);
                let destinations = Arc::clone(&destinations);
                let uploader = Arc::clone(&self.uploader);
                let progress = Arc::clone(&progress);
                let meta = Arc::clone(&meta);

                tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await.map_err(|e| {
                        UploaderError::Upload(format!("worker pool closed: {}", e))
                    })?;

                    let file = &files[index];
                    let destination = &destinations[index];

                    info!("Sending file: {} ({}/{}).", file.path().display(), index + 1, total);
                    let result = upload_file(uploader.as_ref(), file, destination, &meta, is_end).await;
                    let done = progress.finish_one();

                    match &result {
                        Ok(()) => debug!(
                            "Sent file: {} ({}/{} done).",
                            file.path().display(),
                            done,
                            progress.total()
                        ),
                        Err(e) => warn!("Failed to upload file {}: {}", file.path().display(), e),
                    }
                    result
                })
            })
            .collect()
    }

    /// Wait for every task, in list order. Failures and panics become failed
    /// outcomes. Returns whether the wait was interrupted.
    async fn wait_all(
        &self,
        files: &[FileRecord],
        handles: Vec<JoinHandle<Result<()>>>,
    ) -> (Vec<UploadOutcome>, bool) {
        let mut outcomes = Vec::with_capacity(handles.len());
        let mut interrupted = false;

        for (index, mut handle) in handles.into_iter().enumerate() {
            let mut joined = None;

            if !interrupted {
                tokio::select! {
                    biased;
                    result = &mut handle => joined = Some(result),
                    _ = self.interrupt.cancelled() => {
                        error!("Interrupted while waiting for uploads; writing manifest with what completed");
                        interrupted = true;
                    }
                }
            }

            let result = match joined {
                Some(result) => flatten(result),
                None if handle.is_finished() => flatten(handle.await),
                // Detached, not aborted: the upload keeps running.
                None => Err("still running when the wait was interrupted".to_string()),
            };

            outcomes.push(UploadOutcome {
                index,
                path: files[index].path().to_path_buf(),
                result,
            });
        }

        (outcomes, interrupted)
    }
}

fn flatten(
    joined: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> std::result::Result<(), String> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) if e.is_panic() => Err(format!("upload task panicked: {}", e)),
        Err(e) => Err(format!("upload task cancelled: {}", e)),
    }
}

/// Transfer the bytes, then register the file with the batch metadata.
async fn upload_file(
    uploader: &dyn RemoteUploader,
    file: &FileRecord,
    destination: &UploadDestination,
    meta: &BatchMeta,
    is_end: bool,
) -> Result<()> {
    uploader
        .upload_file_with_retry(&destination.upload_url, file.path())
        .await?;

    let info = FileInfo {
        project_id: meta.project_id,
        batch: meta.batch.clone(),
        folder_path: file.parent().display().to_string(),
        file_name: file.file_name(),
        uploaded_path: destination.path.clone(),
        is_end,
        token: meta.token.clone(),
    };
    uploader.upload_file_info(&info).await
}
