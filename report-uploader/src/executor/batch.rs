//! Batch identity for one upload run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `<epoch-millis>-<uuid v4>`, fresh for every run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub fn generate() -> Self {
        Self(format!(
            "{}-{}",
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Batch identifier plus the size of the ordered file list.
///
/// End-of-batch is a property of list position, so it is known before any
/// upload starts and does not depend on completion order.
#[derive(Debug, Clone)]
pub struct BatchContext {
    batch: BatchId,
    total: usize,
}

impl BatchContext {
    pub fn new(batch: BatchId, total: usize) -> Self {
        Self { batch, total }
    }

    pub fn batch(&self) -> &BatchId {
        &self.batch
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_end(&self, index: usize) -> bool {
        index + 1 == self.total
    }
}
