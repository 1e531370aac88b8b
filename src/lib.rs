//! Streaming client for motion-capture servers.
//!
//! The crate connects to a capture server through a [`Transport`], fetches
//! the list of tracked assets, and turns the incoming frame stream into
//! decimated, rounded rigid-body snapshots for a host that polls at its own
//! cadence.
//!
//! # Features
//!
//! - **Tick facade**: one [`Session::tick`] call per host update drives the
//!   whole connect / describe / stream / stop lifecycle
//! - **Lock-free reads**: snapshots are published whole behind an `Arc`
//! - **Asset tracking**: descriptor refetch when the server's asset list changes
//! - **Async consumers**: [`Session::snapshots`] yields a rate-limited stream
//!
//! ## Example (recorded session)
//!
//! ```rust,no_run
//! use mocap_tracker::{ReplayTransport, Session, TickInput};
//!
//! fn main() -> mocap_tracker::Result<()> {
//!     let transport = ReplayTransport::open("take-01.yaml")?;
//!     let mut session = Session::with_defaults(transport);
//!
//!     let input = TickInput::activate("127.0.0.1", "127.0.0.1");
//!     loop {
//!         let output = session.tick(&input);
//!         for (i, name) in output.record.rigid_body_names.iter().enumerate() {
//!             println!("{}: {:?} {:?}", name, output.record.position(i), output.record.quaternion(i));
//!         }
//!         std::thread::sleep(std::time::Duration::from_millis(33));
//!     }
//! }
//! ```

// Core types and error handling
pub mod config;
pub mod descriptors;
mod error;
pub mod extract;
pub mod status;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Frame pipeline
pub mod driver;
pub mod ingest;
pub mod session;
pub mod stream;

// Transports
pub mod transport;
pub mod transports;

// Core exports
pub use error::*;
pub use types::*;

pub use config::SessionOptions;
pub use descriptors::{AssetDescriptor, DescriptorCache};
pub use extract::Capabilities;
pub use ingest::{Delivery, FrameSink, IngestCounts};
pub use session::{STOPPED_MESSAGE, Session, SessionState, TickOutput};
pub use transport::{RawDescriptor, ServerInfo, Transport, TransportClient};
pub use transports::{Recording, ReplayTransport};
