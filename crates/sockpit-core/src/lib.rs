pub mod format;
pub mod logfeed;
pub mod stats;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const MASKED_PASSWORD: &str = "***";

/// Reply to `GET /api/server/status`. The relay omits `stats` while stopped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    #[serde(default)]
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ServerStats>,
}

/// One full telemetry snapshot; each poll supersedes the previous one wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerStats {
    #[serde(default)]
    pub current_connections: u64,
    #[serde(default)]
    pub total_connections: u64,
    #[serde(default)]
    pub rejected_connections: u64,
    #[serde(default)]
    pub closed_connections: u64,
    #[serde(default)]
    pub bytes_sent: u64,
    #[serde(default)]
    pub bytes_received: u64,
    #[serde(default)]
    pub total_traffic: u64,
    #[serde(default)]
    pub uptime: u64,
    /// Older relays omit this; 0 means the ceiling is unknown.
    #[serde(default)]
    pub max_connections: u64,
    #[serde(default)]
    pub client_stats: Vec<ClientStat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientStat {
    pub client_ip: String,
    #[serde(default)]
    pub active_connections: u64,
    #[serde(default)]
    pub total_bytes_sent: u64,
    #[serde(default)]
    pub total_bytes_received: u64,
    #[serde(default)]
    pub total_bytes: u64,
    #[serde(default)]
    pub targets: Vec<TargetStat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetStat {
    pub address: String,
    #[serde(default)]
    pub active_connections: u64,
    #[serde(default)]
    pub bytes_sent: u64,
    #[serde(default)]
    pub bytes_received: u64,
    #[serde(default)]
    pub total_bytes: u64,
}

/// Reply to `GET /api/logs`: a sliding window of recent lines that usually
/// overlaps the previous reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogsResponse {
    #[serde(default)]
    pub logs: Vec<String>,
}

/// Reply shape shared by the config-save and start/stop endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResult {
    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.message.as_deref().unwrap_or(fallback)
    }
}

/// Relay configuration as served by `GET /api/config`. The backend masks the
/// password as `***` on reads; unknown keys are carried through `extra` so a
/// save does not drop them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub server: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u64,
    #[serde(default = "default_target_connect_timeout")]
    pub target_connect_timeout: u64,
    #[serde(default)]
    pub fast_open: bool,
    #[serde(default = "default_workers")]
    pub workers: u64,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl ServerConfig {
    pub fn password_is_masked(&self) -> bool {
        self.password == MASKED_PASSWORD
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    1080
}

fn default_method() -> String {
    "aes-256-cfb".to_string()
}

fn default_timeout() -> u64 {
    43_200
}

fn default_max_connections() -> u64 {
    2_000
}

fn default_target_connect_timeout() -> u64 {
    30
}

fn default_workers() -> u64 {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: default_bind_addr(),
            server_port: default_server_port(),
            password: String::new(),
            method: default_method(),
            timeout: default_timeout(),
            max_connections: default_max_connections(),
            target_connect_timeout: default_target_connect_timeout(),
            fast_open: false,
            workers: default_workers(),
            verbose: false,
            extra: HashMap::new(),
        }
    }
}
