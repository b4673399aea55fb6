//! File discovery: classification predicates and the recursive scanner.

pub mod classify;
pub mod walker;

pub use classify::{FileKind, FileRecord};
pub use walker::{scan_files, WalkOptions};
