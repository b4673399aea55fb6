//! Report Uploader - Main entry point
//!
//! Uploads one report directory to the analytics service and exits.

use anyhow::{Context, Result};
use clap::Parser;
use report_uploader::{
    client::{AnalyticsClient, RetryPolicy},
    config::Config,
    executor::{UploadExecutor, UploadJob},
    signal::InterruptSignal,
    utils, UploaderError,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Report directory to upload (overrides config)
    #[arg(long, value_name = "DIR")]
    path: Option<PathBuf>,

    /// Account email (overrides config)
    #[arg(long)]
    email: Option<String>,

    /// Account password (overrides config)
    #[arg(long)]
    password: Option<String>,

    /// Project id (overrides config)
    #[arg(long)]
    project_id: Option<i64>,

    /// Where to write the completion manifest (overrides config)
    #[arg(long, value_name = "FILE")]
    upload_info_file_path: Option<PathBuf>,

    /// Maximum concurrent uploads (overrides config)
    #[arg(long)]
    max_workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(path) = self.path {
            config.upload.path = path;
        }
        if let Some(email) = self.email {
            config.analytics.email = email;
        }
        if let Some(password) = self.password {
            config.analytics.password = password;
        }
        if let Some(project_id) = self.project_id {
            config.analytics.project_id = project_id;
        }
        if let Some(path) = self.upload_info_file_path {
            config.upload.upload_info_file_path = path;
        }
        if let Some(max_workers) = self.max_workers {
            config.upload.max_workers = max_workers;
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration: file, then environment, then flags
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => Config::default(),
    };
    config.apply_env_overrides()?;
    args.apply(&mut config);

    utils::logger::init(&config.log.level)?;
    config.validate()?;

    tracing::info!(
        "Starting report-uploader v{} (project: {})",
        env!("CARGO_PKG_VERSION"),
        config.analytics.project_id
    );

    let client = Arc::new(
        AnalyticsClient::new(&config.analytics, RetryPolicy::from(&config.retry))
            .context("failed to build analytics client")?,
    );

    let interrupt = InterruptSignal::new();
    let signal_task = {
        let interrupt = interrupt.clone();
        tokio::spawn(async move { interrupt.wait_for_signal().await })
    };

    let executor = UploadExecutor::new(client.clone(), client.clone(), client)
        .with_interrupt(interrupt.token());
    let result = executor.execute(&UploadJob::from_config(&config)).await;
    signal_task.abort();

    match result {
        Ok(report) => {
            tracing::info!(
                "Upload finished: batch {}, {}/{} files uploaded",
                report.batch,
                report.succeeded(),
                report.total
            );
            Ok(())
        }
        Err(UploaderError::Interrupted) => {
            tracing::warn!("Upload interrupted; manifest written with the planned file list");
            Err(UploaderError::Interrupted.into())
        }
        Err(e) => {
            tracing::error!("Upload failed: {}", e);
            Err(e.into())
        }
    }
}
