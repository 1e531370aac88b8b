//! Transport implementations shipped with the crate

pub mod replay;

pub use replay::{Recording, ReplayClient, ReplayTransport};
