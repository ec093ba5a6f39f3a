use serde::{Deserialize, Serialize};

/// Public hostname used when `HOST` is not set.
pub const DEFAULT_HOST: &str = "argentaplay.com";

/// Shared configuration document read by every subservice.
///
/// Written once to disk on first launch and reused afterwards, so operator
/// edits survive restarts. Never mutated in memory: the supervisor shares it
/// as an `Arc<RuntimeConfig>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Combined port/path descriptor, e.g. `443/slots`.
    pub port: String,
    pub host: String,
    pub prefix: String,
    pub host_ws: String,
    pub prefix_ws: String,
    pub ssl: bool,
}

impl RuntimeConfig {
    pub fn defaults(host: &str) -> Self {
        Self {
            port: "443/slots".to_string(),
            host: host.to_string(),
            prefix: "https://".to_string(),
            host_ws: host.to_string(),
            prefix_ws: "wss://".to_string(),
            ssl: true,
        }
    }

    /// External websocket address of a subservice listening on `port`.
    pub fn websocket_url(&self, port: u32, route: &str) -> String {
        format!("{}{}:{port}/{route}", self.prefix_ws, self.host_ws)
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::defaults(DEFAULT_HOST)
    }
}
