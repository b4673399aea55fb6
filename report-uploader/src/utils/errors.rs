//! Custom error types for the report uploader.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploaderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Upload info allocation error: {0}")]
    Allocation(String),

    #[error("Scan error: {0}")]
    Scan(String),

    #[error("Bundle error: {0}")]
    Bundle(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Upload interrupted")]
    Interrupted,
}

impl From<zip::result::ZipError> for UploaderError {
    fn from(e: zip::result::ZipError) -> Self {
        UploaderError::Bundle(e.to_string())
    }
}

impl From<walkdir::Error> for UploaderError {
    fn from(e: walkdir::Error) -> Self {
        UploaderError::Scan(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UploaderError>;
