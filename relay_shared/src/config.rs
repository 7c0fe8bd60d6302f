//! Configuration system.
//!
//! Loads relay configuration from JSON strings/files (file IO left to app).

use serde::{Deserialize, Serialize};

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Server listen/connect address, e.g. `127.0.0.1:3000`.
    pub server_addr: String,
    /// Fixed rate at which a client sends `update-box` events.
    #[serde(default = "default_send_hz")]
    pub send_hz: u32,
    /// Connections beyond this are refused.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
}

fn default_send_hz() -> u32 {
    24
}

fn default_max_clients() -> usize {
    64
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3000".to_string(),
            send_hz: default_send_hz(),
            max_clients: default_max_clients(),
        }
    }
}

impl RelayConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
