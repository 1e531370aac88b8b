//! Transport traits for capture-server clients

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::ingest::FrameSink;
use crate::types::ConnectionConfig;

/// Frame rate assumed when the server does not report one
pub const DEFAULT_FRAME_RATE: f64 = 120.0;

/// Server identity returned by the description request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Host computer name
    pub host: String,

    /// Name of the streaming application
    pub application: String,

    /// Raw frames per second the server streams
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
}

fn default_frame_rate() -> f64 {
    DEFAULT_FRAME_RATE
}

/// Asset description as the transport delivers it.
///
/// `type_tag` selects which of the optional fields are meaningful; see
/// [`DescriptorType`](crate::descriptors::DescriptorType) for the known tags.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDescriptor {
    pub type_tag: i32,
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub name: String,
    /// Skeleton bones, each itself a rigid-body description
    #[serde(default)]
    pub bones: Vec<RawDescriptor>,
    /// Force plate serial number
    #[serde(default)]
    pub serial: String,
    /// Force plate channel names
    #[serde(default)]
    pub channel_names: Vec<String>,
}

/// Entry point of a capture-server SDK.
///
/// The session owns its transport and calls `connect` once per activation.
pub trait Transport: Send + 'static {
    /// Connected client handle
    type Client: TransportClient;

    /// Open a connection to the server named in `config`.
    ///
    /// Must return (or fail) within a bounded time chosen by the transport.
    fn connect(&mut self, config: &ConnectionConfig) -> Result<Self::Client>;
}

/// A live connection to the capture server.
///
/// Frame delivery runs on a thread owned by the transport. Implementations
/// push each frame into the registered [`FrameSink`] and must stop touching
/// the sink once `unregister_frame_callback` returns.
pub trait TransportClient: Send + 'static {
    /// Request server identity; the first round trip after connecting
    fn server_description(&mut self) -> Result<ServerInfo>;

    /// Request the full asset list
    fn data_descriptions(&mut self) -> Result<Vec<RawDescriptor>>;

    /// Start delivering frames into `sink`
    fn register_frame_callback(&mut self, sink: FrameSink);

    /// Stop delivering frames and drop the sink
    fn unregister_frame_callback(&mut self);

    /// Close the connection
    fn disconnect(&mut self);
}
