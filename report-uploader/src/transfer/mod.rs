//! Upload progress tracking and body integrity.

pub mod length_check;
pub mod progress;
