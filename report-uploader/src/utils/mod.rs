//! Utility modules for the report uploader.

pub mod errors;
pub mod logger;

pub use errors::{Result, UploaderError};
