//! Error types for the tracking session.
//!
//! Every failure in this crate is recoverable from the caller's point of view:
//! the session facade turns errors into status log lines and keeps serving the
//! last good (or an empty) snapshot. The error values still carry structured
//! context so transports and tests can tell the failure modes apart.
//!
//! ## Error Categories
//!
//! - **Connection Errors**: the capture server is unreachable or refused us
//! - **Descriptor Errors**: the asset list could not be fetched or parsed
//! - **Unknown Descriptors**: a descriptor carried a type tag we do not model
//! - **Configuration Errors**: invalid options or unreadable option files
//!
//! ```rust
//! use mocap_tracker::TrackerError;
//!
//! let error = TrackerError::connection_failed("server refused connection");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tracker operations.
pub type Result<T, E = TrackerError> = std::result::Result<T, E>;

/// Main error type for tracker operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TrackerError {
    #[error("Failed to connect to capture server: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Failed to fetch data descriptions: {reason}")]
    DescriptorFetch {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unknown data descriptor type tag {type_tag}")]
    UnknownDescriptorType { type_tag: i32 },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },
}

impl TrackerError {
    /// Returns whether re-issuing the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TrackerError::Connection { .. } => true,
            TrackerError::DescriptorFetch { .. } => true,
            TrackerError::UnknownDescriptorType { .. } => false,
            TrackerError::Config { .. } => false,
            TrackerError::File { .. } => false,
            TrackerError::Parse { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TrackerError::Connection { .. } => vec![
                "Ensure the capture server is running and streaming",
                "Check the local and server IP addresses",
                "Toggle activate to retry the connection",
            ],
            TrackerError::DescriptorFetch { .. } => vec![
                "Check that the server has an active asset list",
                "Toggle activate or reset to fetch descriptions again",
            ],
            TrackerError::UnknownDescriptorType { .. } => {
                vec!["Check the server and client protocol versions match"]
            }
            TrackerError::Config { .. } => vec![
                "Check option values against their documented ranges",
                "Remove the option to fall back to its default",
            ],
            TrackerError::File { .. } => {
                vec!["Check the file exists and is readable", "Check file permissions"]
            }
            TrackerError::Parse { .. } => {
                vec!["Check the document format", "Verify source data integrity"]
            }
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        TrackerError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TrackerError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for descriptor fetch errors.
    pub fn descriptor_fetch_failed(reason: impl Into<String>) -> Self {
        TrackerError::DescriptorFetch { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors.
    pub fn invalid_config(details: impl Into<String>) -> Self {
        TrackerError::Config { details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TrackerError::File { path, source }
    }
}

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}
