//! Import statistics tracking.
//!
//! This module provides thread-safe counters for the recoverable defects met
//! while importing an archive. The archive reader runs on a blocking thread
//! while the inserter runs on the async runtime, so counters are atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::RowDefect;

/// Thread-safe row defect tracker.
///
/// All defect kinds are initialized to zero on creation. Share it across the
/// archive reader and the inserter with `Arc`.
#[derive(Debug)]
pub struct ImportStats {
    defects: HashMap<RowDefect, AtomicUsize>,
}

impl ImportStats {
    /// Creates a tracker with every counter at zero.
    pub fn new() -> Self {
        let mut defects = HashMap::new();
        for defect in RowDefect::iter() {
            defects.insert(defect, AtomicUsize::new(0));
        }
        ImportStats { defects }
    }

    /// Increment a defect counter.
    pub fn record(&self, defect: RowDefect) {
        if let Some(counter) = self.defects.get(&defect) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment defect counter for {:?} which is not in the map",
                defect
            );
        }
    }

    /// Get the count for a defect kind.
    pub fn count(&self, defect: RowDefect) -> usize {
        self.defects
            .get(&defect)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Total number of defects of every kind.
    pub fn total(&self) -> usize {
        self.defects.values().map(|c| c.load(Ordering::SeqCst)).sum()
    }

    /// Logs every non-zero counter.
    pub fn log_summary(&self) {
        if self.total() == 0 {
            log::info!("No row defects encountered");
            return;
        }
        for defect in RowDefect::iter() {
            let count = self.count(defect);
            if count > 0 {
                log::warn!("Skipped {} x {}", count, defect);
            }
        }
    }
}

impl Default for ImportStats {
    fn default() -> Self {
        Self::new()
    }
}
