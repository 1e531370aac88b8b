//! Core value types shared by the transport, ingest and consumer sides.
//!
//! - Raw frames from the transport: [`FrameSample`], [`RigidBodySample`], [`MarkerSample`]
//! - The published snapshot: [`OutputRecord`]
//! - Host inputs: [`TickInput`], [`ConnectionConfig`], [`ConnectionMode`]
//! - Consumer stream pacing: [`UpdateRate`]

mod connection;
mod frame;
mod output;
mod update_rate;

pub use connection::{ConnectionConfig, ConnectionMode, DEFAULT_ADDRESS, TickInput};
pub use frame::{FrameSample, MarkerSample, RigidBodySample};
pub use output::OutputRecord;
pub use update_rate::UpdateRate;
