//! Connection settings and per-tick inputs

use serde::{Deserialize, Serialize};

/// Default address for both ends of the connection.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// How the server delivers frame data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ConnectionMode {
    #[default]
    Multicast,
    Unicast,
}

/// Addresses and delivery mode for one session.
///
/// Fixed once a session starts connecting; changing it takes a reset or a
/// deactivate/activate cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ConnectionConfig {
    pub local_address: String,
    pub server_address: String,
    pub mode: ConnectionMode,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            local_address: DEFAULT_ADDRESS.to_string(),
            server_address: DEFAULT_ADDRESS.to_string(),
            mode: ConnectionMode::Multicast,
        }
    }
}

/// The four logical inputs the host supplies every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TickInput {
    pub activate: bool,
    pub reset: bool,
    pub local_address: String,
    pub server_address: String,
}

impl Default for TickInput {
    fn default() -> Self {
        Self {
            activate: false,
            reset: false,
            local_address: DEFAULT_ADDRESS.to_string(),
            server_address: DEFAULT_ADDRESS.to_string(),
        }
    }
}

impl TickInput {
    /// Inputs for a tick that keeps (or starts) streaming against `server_address`
    pub fn activate(local_address: impl Into<String>, server_address: impl Into<String>) -> Self {
        Self {
            activate: true,
            reset: false,
            local_address: local_address.into(),
            server_address: server_address.into(),
        }
    }

    /// Same inputs with the activate switch off
    pub fn deactivated(mut self) -> Self {
        self.activate = false;
        self
    }

    /// Same inputs with the reset switch on
    pub fn with_reset(mut self) -> Self {
        self.reset = true;
        self
    }

    /// Connection settings these inputs describe
    pub fn connection_config(&self, mode: ConnectionMode) -> ConnectionConfig {
        ConnectionConfig {
            local_address: self.local_address.clone(),
            server_address: self.server_address.clone(),
            mode,
        }
    }
}
