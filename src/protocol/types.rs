//! JSON payloads carried inline in the `INFO` and `CONNECT` control lines.

use serde::{Deserialize, Serialize};

/// Server handshake info, received once as the first line of a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub server_id: String,
    pub version: String,
    pub proto: i64,
    pub host: String,
    pub port: u16,
    pub max_payload: usize,
    #[serde(default)]
    pub auth_required: bool,
    #[serde(default)]
    pub tls_required: bool,
    #[serde(default)]
    pub headers: bool,
}

/// Client-side `CONNECT` options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectOpts {
    pub verbose: bool,
    pub pedantic: bool,
    pub name: String,
    pub lang: String,
    pub version: String,
    pub protocol: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for ConnectOpts {
    fn default() -> Self {
        Self {
            verbose: false,
            pedantic: false,
            name: "lineoms".to_string(),
            lang: "rust".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol: 1,
            auth_token: None,
        }
    }
}
