//! Session options
//!
//! Options are plain serde values with defaults for every field, so a YAML
//! file only needs to name what it changes:
//!
//! ```rust
//! use mocap_tracker::SessionOptions;
//!
//! let options = SessionOptions::from_yaml("decimation: 2\ncapabilities:\n  markers: true\n")?;
//! assert_eq!(options.decimation, 2);
//! assert!(options.capabilities.markers);
//! assert!(options.capabilities.rigid_bodies);
//! # Ok::<(), mocap_tracker::TrackerError>(())
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::extract::Capabilities;
use crate::types::ConnectionMode;
use crate::{Result, TrackerError};

/// Largest rounding precision accepted for output values
pub const MAX_DECIMALS: u32 = 12;

/// Tunables for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Delivery mode requested on connect
    pub connection_mode: ConnectionMode,

    /// Extract only frames whose index is a multiple of this
    pub decimation: u64,

    /// Decimal places kept for positions
    pub position_decimals: u32,

    /// Decimal places kept for quaternion components
    pub quaternion_decimals: u32,

    /// Which asset kinds are extracted
    pub capabilities: Capabilities,

    /// Frames buffered between the transport and the ingest worker
    pub frame_queue_capacity: usize,

    /// Status lines retained, oldest dropped first
    pub max_log_lines: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connection_mode: ConnectionMode::Multicast,
            // 120 fps cameras land at 30 snapshots per second
            decimation: 4,
            position_decimals: 4,
            quaternion_decimals: 6,
            capabilities: Capabilities::default(),
            frame_queue_capacity: 8,
            max_log_lines: 512,
        }
    }
}

impl SessionOptions {
    /// Parse and validate options from a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let options: SessionOptions =
            serde_yaml_ng::from_str(yaml).map_err(|e| TrackerError::Parse {
                context: "Session options".to_string(),
                details: e.to_string(),
            })?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::file_error(path.to_path_buf(), e))?;
        debug!(path = %path.display(), "Loaded session options");
        Self::from_yaml(&yaml)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.decimation == 0 {
            return Err(TrackerError::invalid_config("decimation must be at least 1"));
        }
        if self.frame_queue_capacity == 0 {
            return Err(TrackerError::invalid_config("frame_queue_capacity must be at least 1"));
        }
        if self.max_log_lines == 0 {
            return Err(TrackerError::invalid_config("max_log_lines must be at least 1"));
        }
        if self.position_decimals > MAX_DECIMALS || self.quaternion_decimals > MAX_DECIMALS {
            return Err(TrackerError::invalid_config(format!(
                "decimal places must not exceed {}",
                MAX_DECIMALS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = SessionOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.decimation, 4);
        assert_eq!(options.position_decimals, 4);
        assert_eq!(options.quaternion_decimals, 6);
        assert_eq!(options.connection_mode, ConnectionMode::Multicast);
    }

    #[test]
    fn yaml_overrides_only_named_fields() {
        let options =
            SessionOptions::from_yaml("connection_mode: unicast\nframe_queue_capacity: 32\n")
                .expect("valid options");
        assert_eq!(options.connection_mode, ConnectionMode::Unicast);
        assert_eq!(options.frame_queue_capacity, 32);
        assert_eq!(options.decimation, 4);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for yaml in [
            "decimation: 0",
            "frame_queue_capacity: 0",
            "max_log_lines: 0",
            "position_decimals: 13",
        ] {
            let err = SessionOptions::from_yaml(yaml).expect_err(yaml);
            assert!(matches!(err, TrackerError::Config { .. }), "{yaml}: {err}");
        }
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = SessionOptions::from_yaml("decimation: [").expect_err("broken yaml");
        assert!(matches!(err, TrackerError::Parse { .. }));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = SessionOptions::load("/nonexistent/tracker.yaml").expect_err("no file");
        match err {
            TrackerError::File { path, .. } => {
                assert!(path.ends_with("tracker.yaml"));
            }
            other => panic!("expected file error, got {other}"),
        }
    }
}
