//! Delivery rate for snapshot streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delivery rate for snapshot streams
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every published snapshot
    Native,

    /// At most this many snapshots per second, latest wins
    Max(u32),
}

impl UpdateRate {
    /// Normalize against the rate snapshots are actually published at.
    ///
    /// A cap at or above the published rate, or a cap of zero, is a no-op.
    pub fn normalize(self, published_hz: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if hz as f64 >= published_hz => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz),
        }
    }

    /// Throttle interval if one is needed
    pub fn throttle_interval(self, published_hz: f64) -> Option<Duration> {
        match self.normalize(published_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
