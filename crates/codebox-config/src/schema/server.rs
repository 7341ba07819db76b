use serde::{Deserialize, Serialize};

/// Socket listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,
    /// Largest accepted inbound frame, in bytes.
    pub max_message_bytes: usize,
    /// Capacity of the per-connection outbound queue (messages).
    pub outbound_buffer: usize,
    /// Seconds between server pings.
    pub ping_interval_secs: u64,
    /// Seconds of client silence before the connection is considered dead.
    pub heartbeat_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3001".into(),
            max_message_bytes: 4 * 1024 * 1024,
            outbound_buffer: 256,
            ping_interval_secs: 30,
            heartbeat_timeout_secs: 90,
        }
    }
}
