//! Human-readable status log shown to the host

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::info;

/// Ordered, append-only list of status lines, bounded to the newest `capacity`.
///
/// Both the tick and the ingest worker append; the mutex serializes them.
/// Every line is mirrored to `tracing`.
#[derive(Debug)]
pub struct StatusLog {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl StatusLog {
    pub fn new(capacity: usize) -> Self {
        Self { lines: Mutex::new(VecDeque::new()), capacity: capacity.max(1) }
    }

    fn guard(&self) -> MutexGuard<'_, VecDeque<String>> {
        // Lines are plain strings; a panic mid-push cannot leave them torn
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, line: impl Into<String>) {
        let line = line.into();
        info!(target: "mocap_tracker::status", "{}", line);
        let mut lines = self.guard();
        lines.push_back(line);
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    pub fn extend<I>(&self, new_lines: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut lines = self.guard();
        for line in new_lines {
            info!(target: "mocap_tracker::status", "{}", line);
            lines.push_back(line);
        }
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    /// Copy of the current lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.guard().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}
