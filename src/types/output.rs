//! Consumer-facing output snapshot

use serde::{Deserialize, Serialize};

/// Fully-formed extraction result for one decimated frame.
///
/// Records are built off to the side and published whole behind an `Arc`;
/// a reader never sees the name, position and quaternion lists out of step.
/// Positions are `x, y, z` triples and quaternions are `w, x, y, z` quads,
/// one of each per entry in `rigid_body_names`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct OutputRecord {
    /// Source frame, `None` for the empty record
    pub frame_index: Option<u64>,

    /// Server was recording when the frame was captured
    pub recording: bool,

    pub rigid_body_names: Vec<String>,
    pub rigid_body_positions: Vec<f64>,
    pub rigid_body_quaternions: Vec<f64>,

    /// Labeled marker positions, one `[x, y, z]` per label
    pub points: Vec<[f64; 3]>,
    pub labels: Vec<String>,
}

impl OutputRecord {
    /// Record published when nothing is streaming
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of tracked rigid bodies in this record
    pub fn tracked_count(&self) -> usize {
        self.rigid_body_names.len()
    }

    /// Check the list-length contract the host relies on
    pub fn is_consistent(&self) -> bool {
        let n = self.rigid_body_names.len();
        self.rigid_body_positions.len() == n * 3
            && self.rigid_body_quaternions.len() == n * 4
            && self.points.len() == self.labels.len()
    }

    /// Position triple of the `index`th tracked body
    pub fn position(&self, index: usize) -> Option<[f64; 3]> {
        let start = index.checked_mul(3)?;
        let chunk = self.rigid_body_positions.get(start..start.checked_add(3)?)?;
        Some([chunk[0], chunk[1], chunk[2]])
    }

    /// `W, X, Y, Z` quaternion of the `index`th tracked body
    pub fn quaternion(&self, index: usize) -> Option<[f64; 4]> {
        let start = index.checked_mul(4)?;
        let chunk = self.rigid_body_quaternions.get(start..start.checked_add(4)?)?;
        Some([chunk[0], chunk[1], chunk[2], chunk[3]])
    }
}
