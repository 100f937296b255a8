use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::rpc::StdioTransport;

/// Lifecycle of one registry entry. `NotLoaded` has no entry at all; an
/// entry is created on spawn and destroyed on unload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ServerStatus {
    Starting,
    Handshaking,
    Active,
    /// Advisory: no heartbeat within the configured window. Not auto-recovered.
    Unresponsive,
    Terminated,
}

impl ServerStatus {
    /// Whether an `ensure_running` call may reuse this entry instead of
    /// spawning a second process for the same path.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            Self::Starting | Self::Handshaking | Self::Active | Self::Unresponsive
        )
    }
}

/// Ordinal trust assigned to a server. New servers start one step above the
/// floor, pending upgrade.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrustTier {
    Untrusted,
    Provisional,
    Trusted,
    Verified,
}

impl Default for TrustTier {
    fn default() -> Self {
        Self::Provisional
    }
}

/// A running or previously-running helper process. Identity and the
/// subprocess handle are exclusively owned by the supervisor.
#[derive(Debug)]
pub struct ToolServer {
    pub id: String,
    pub path: PathBuf,
    pub tools: Vec<String>,
    pub protocol_version: Option<String>,
    pub status: ServerStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub trust_tier: TrustTier,
    pub(crate) transport: Option<Arc<StdioTransport>>,
}

impl ToolServer {
    pub(crate) fn starting(path: &std::path::Path) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path: path.to_path_buf(),
            tools: Vec::new(),
            protocol_version: None,
            status: ServerStatus::Starting,
            last_heartbeat: Utc::now(),
            trust_tier: TrustTier::default(),
            transport: None,
        }
    }
}

/// Snapshot of one entry, safe to hand to callers. No process handle.
#[derive(Debug, Clone, Serialize)]
pub struct ToolServerInfo {
    pub id: String,
    pub path: String,
    pub tools: Vec<String>,
    pub protocol_version: Option<String>,
    pub status: ServerStatus,
    pub last_heartbeat: DateTime<Utc>,
    pub trust_tier: TrustTier,
}

impl From<&ToolServer> for ToolServerInfo {
    fn from(server: &ToolServer) -> Self {
        Self {
            id: server.id.clone(),
            path: server.path.to_string_lossy().to_string(),
            tools: server.tools.clone(),
            protocol_version: server.protocol_version.clone(),
            status: server.status,
            last_heartbeat: server.last_heartbeat,
            trust_tier: server.trust_tier,
        }
    }
}
