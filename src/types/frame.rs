//! Per-frame pose samples delivered by the transport

use serde::{Deserialize, Serialize};

/// Pose of one rigid body in a single frame, as reported by the server.
///
/// The quaternion arrives in the transport's `X, Y, Z, W` layout.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RigidBodySample {
    /// Server-side tracking id
    #[serde(default)]
    pub tracking_id: i32,

    /// Whether the body was solved in this frame
    #[serde(default)]
    pub tracked: bool,

    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,

    #[serde(default)]
    pub qx: f64,
    #[serde(default)]
    pub qy: f64,
    #[serde(default)]
    pub qz: f64,
    #[serde(default = "identity_w")]
    pub qw: f64,
}

fn identity_w() -> f64 {
    1.0
}

/// A labeled marker position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarkerSample {
    pub id: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One raw frame of mocap data.
///
/// The transport hands ownership of each sample to the ingest pipeline; it is
/// never shared with the consumer directly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameSample {
    /// Monotonic frame counter from the server
    pub frame_index: u64,

    /// Server is recording this take
    #[serde(default)]
    pub recording: bool,

    /// Rigid body poses, in the order the server streams them
    #[serde(default)]
    pub rigid_bodies: Vec<RigidBodySample>,

    /// Labeled marker positions
    #[serde(default)]
    pub labeled_markers: Vec<MarkerSample>,

    /// Declared skeleton count for this frame
    #[serde(default)]
    pub skeleton_count: usize,

    /// Declared force plate count for this frame
    #[serde(default)]
    pub force_plate_count: usize,

    /// Server flagged a change in its tracking models
    #[serde(default)]
    pub tracking_models_changed: bool,
}

impl FrameSample {
    /// Create an empty frame with the given index
    pub fn new(frame_index: u64) -> Self {
        Self { frame_index, ..Self::default() }
    }

    /// Number of rigid bodies declared in this frame
    pub fn rigid_body_count(&self) -> usize {
        self.rigid_bodies.len()
    }
}

impl RigidBodySample {
    /// A tracked body at the given position with the given `X, Y, Z, W` rotation
    pub fn tracked(tracking_id: i32, position: [f64; 3], rotation: [f64; 4]) -> Self {
        let [x, y, z] = position;
        let [qx, qy, qz, qw] = rotation;
        Self { tracking_id, tracked: true, x, y, z, qx, qy, qz, qw }
    }

    /// A body the server reported but could not solve
    pub fn untracked(tracking_id: i32) -> Self {
        Self { tracking_id, tracked: false, qw: 1.0, ..Self::default() }
    }
}
