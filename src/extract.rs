//! Rigid body and marker extraction

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::SessionOptions;
use crate::descriptors::DescriptorCache;
use crate::types::{FrameSample, OutputRecord};

/// Asset kinds the extractor emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub rigid_bodies: bool,
    pub markers: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self { rigid_bodies: true, markers: false }
    }
}

/// Round to `decimals` places, ties to even.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

/// Status line for a described body missing from a frame's solve
pub fn untracked_note(name: &str) -> String {
    format!("{} is not tracked in current frame.", name)
}

/// Result of extracting one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub record: OutputRecord,
    /// Status lines to append alongside the record
    pub notes: Vec<String>,
}

/// Turns raw frames into output records.
#[derive(Debug, Clone, Copy)]
pub struct Extractor {
    capabilities: Capabilities,
    position_decimals: u32,
    quaternion_decimals: u32,
}

impl Extractor {
    pub fn new(options: &SessionOptions) -> Self {
        Self {
            capabilities: options.capabilities,
            position_decimals: options.position_decimals,
            quaternion_decimals: options.quaternion_decimals,
        }
    }

    /// Build a complete record for `frame` against `cache`.
    ///
    /// The `i`th cached rigid body names the `i`th rigid body sample. Samples
    /// past the end of the cache, and cached bodies past the end of the frame,
    /// contribute nothing.
    pub fn extract(&self, cache: &DescriptorCache, frame: &FrameSample) -> Extraction {
        let mut record = OutputRecord {
            frame_index: Some(frame.frame_index),
            recording: frame.recording,
            ..OutputRecord::default()
        };
        let mut notes = Vec::new();

        if self.capabilities.rigid_bodies {
            for (descriptor, sample) in cache.rigid_bodies().iter().zip(&frame.rigid_bodies) {
                if !sample.tracked {
                    notes.push(untracked_note(&descriptor.name));
                    continue;
                }

                record.rigid_body_names.push(descriptor.name.clone());
                record.rigid_body_positions.extend(
                    [sample.x, sample.y, sample.z].map(|v| round_to(v, self.position_decimals)),
                );
                // Transport order is X, Y, Z, W; consumers expect W first
                record.rigid_body_quaternions.extend(
                    [sample.qw, sample.qx, sample.qy, sample.qz]
                        .map(|v| round_to(v, self.quaternion_decimals)),
                );
            }
        }

        if self.capabilities.markers {
            for marker in &frame.labeled_markers {
                record.points.push(
                    [marker.x, marker.y, marker.z].map(|v| round_to(v, self.position_decimals)),
                );
                record.labels.push(marker.id.to_string());
            }
        }

        trace!(
            frame = frame.frame_index,
            tracked = record.tracked_count(),
            untracked = notes.len(),
            "Extracted frame"
        );
        Extraction { record, notes }
    }
}
