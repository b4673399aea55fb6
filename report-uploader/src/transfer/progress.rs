//! Progress bookkeeping for an upload batch.
//!
//! The counter only feeds log lines. Nothing decides ordering or end-of-batch
//! from it: those come from each file's static index.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared count of finished uploads, safe to bump from any worker
#[derive(Debug)]
pub struct ProgressCounter {
    done: AtomicUsize,
    total: usize,
}

impl ProgressCounter {
    pub fn new(total: usize) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total,
        }
    }

    /// Record one finished file and return how many are done, including it.
    pub fn finish_one(&self) -> usize {
        self.done.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}
