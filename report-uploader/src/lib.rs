//! Report Uploader Library
//!
//! Uploads test-run logs and bundled HAR captures to the Katalon analytics
//! service as one batch, then writes a manifest of what was sent.

pub mod bundle;
pub mod client;
pub mod config;
pub mod executor;
pub mod fs;
pub mod signal;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::UploaderError;
pub type Result<T> = std::result::Result<T, UploaderError>;
