//! Registry of tool-server subprocesses.
//!
//! The supervisor is the sole owner of subprocess handles: all registry
//! mutation is serialized through one async lock, so concurrent callers
//! queue instead of racing on spawn. The registry is ephemeral:
//! process-lifetime only, never persisted.

use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::types::{ServerStatus, ToolServer, ToolServerInfo};
use crate::error::{Result, RpcError, ServerError};
use crate::rpc::StdioTransport;

/// Heartbeats older than this mark an entry `Unresponsive` (advisory).
const DEFAULT_HEARTBEAT_WINDOW_SECS: i64 = 120;

pub struct ProcessSupervisor {
    registry: Mutex<HashMap<String, ToolServer>>,
    rpc_timeout: Duration,
    protocol_version: String,
    heartbeat_window: chrono::Duration,
}

impl ProcessSupervisor {
    #[must_use]
    pub fn new(rpc_timeout: Duration, protocol_version: &str) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            rpc_timeout,
            protocol_version: protocol_version.to_string(),
            heartbeat_window: chrono::Duration::seconds(DEFAULT_HEARTBEAT_WINDOW_SECS),
        }
    }

    /// Return the id of a live server for `path`, spawning and handshaking a
    /// new one if needed. Exact-path dedup: a live entry is reused, never
    /// double-spawned. The caller must have passed the whitelist gate first.
    pub async fn ensure_running(&self, path: &Path) -> Result<String> {
        let mut registry = self.registry.lock().await;

        if let Some(existing) = registry.values().find(|s| s.path == path && s.status.is_live())
        {
            return Ok(existing.id.clone());
        }

        let mut server = ToolServer::starting(path);
        let id = server.id.clone();
        tracing::info!(%id, path = %path.display(), "starting tool server");

        let transport = match StdioTransport::spawn(path, self.rpc_timeout).await {
            Ok(transport) => transport,
            Err(error) => {
                server.status = ServerStatus::Terminated;
                registry.insert(id, server);
                return Err(ServerError::ConnectionFailed {
                    path: path.to_string_lossy().to_string(),
                    message: error.to_string(),
                }
                .into());
            }
        };

        server.status = ServerStatus::Handshaking;
        match transport.initialize(&self.protocol_version).await {
            Ok(handshake) => {
                tracing::info!(
                    %id,
                    server = %handshake.server_info.name,
                    tools = handshake.tools.len(),
                    "tool server active"
                );
                server.tools = handshake.tools;
                server.protocol_version = handshake.protocol_version;
                server.status = ServerStatus::Active;
                server.last_heartbeat = Utc::now();
                server.transport = Some(Arc::new(transport));
                registry.insert(id.clone(), server);
                Ok(id)
            }
            Err(error) => {
                tracing::warn!(%id, %error, "handshake failed; terminating");
                transport.shutdown().await;
                server.status = ServerStatus::Terminated;
                registry.insert(id, server);
                Err(error.into())
            }
        }
    }

    /// Kill and forget a server. Idempotent: unknown or already-terminated
    /// ids are a no-op.
    pub async fn terminate(&self, id: &str) {
        let removed = self.registry.lock().await.remove(id);
        match removed {
            Some(server) => {
                if let Some(transport) = &server.transport {
                    transport.shutdown().await;
                }
                tracing::info!(%id, path = %server.path.display(), "tool server terminated");
            }
            None => {
                tracing::debug!(%id, "terminate: no such server (no-op)");
            }
        }
    }

    /// Point-in-time snapshot of every entry, with health refreshed.
    pub async fn list(&self) -> Vec<ToolServerInfo> {
        let mut registry = self.registry.lock().await;
        let now = Utc::now();
        for server in registry.values_mut() {
            refresh_health(server, now, self.heartbeat_window);
        }
        let mut entries: Vec<ToolServerInfo> =
            registry.values().map(ToolServerInfo::from).collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }

    /// Hand out the transport for a call. A dead process invalidates the
    /// entry; the next `ensure_running` for its path starts fresh.
    pub async fn transport(&self, id: &str) -> Result<Arc<StdioTransport>> {
        let mut registry = self.registry.lock().await;
        let server = registry
            .get_mut(id)
            .ok_or_else(|| ServerError::NotFound { id: id.to_string() })?;

        if server.status == ServerStatus::Terminated {
            return Err(ServerError::ProcessTerminated { id: id.to_string() }.into());
        }

        let transport = server
            .transport
            .clone()
            .ok_or_else(|| ServerError::ProcessTerminated { id: id.to_string() })?;

        if !transport.is_alive() {
            server.status = ServerStatus::Terminated;
            server.transport = None;
            return Err(ServerError::ProcessTerminated { id: id.to_string() }.into());
        }

        Ok(transport)
    }

    /// Record a successful exchange. A live response restores `Active` from
    /// the advisory `Unresponsive` state.
    pub async fn touch(&self, id: &str) {
        if let Some(server) = self.registry.lock().await.get_mut(id) {
            server.last_heartbeat = Utc::now();
            if server.status == ServerStatus::Unresponsive {
                server.status = ServerStatus::Active;
            }
        }
    }

    /// Mark an entry dead after a mid-call process failure.
    pub async fn invalidate(&self, id: &str, error: &RpcError) {
        if let Some(server) = self.registry.lock().await.get_mut(id) {
            tracing::warn!(%id, %error, "invalidating tool server entry");
            server.status = ServerStatus::Terminated;
            server.transport = None;
        }
    }
}

fn refresh_health(
    server: &mut ToolServer,
    now: chrono::DateTime<Utc>,
    window: chrono::Duration,
) {
    match server.status {
        ServerStatus::Active => {
            let dead = server.transport.as_ref().is_none_or(|t| !t.is_alive());
            if dead {
                server.status = ServerStatus::Terminated;
                server.transport = None;
            } else if now - server.last_heartbeat > window {
                server.status = ServerStatus::Unresponsive;
            }
        }
        ServerStatus::Unresponsive => {
            if server.transport.as_ref().is_none_or(|t| !t.is_alive()) {
                server.status = ServerStatus::Terminated;
                server.transport = None;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn terminate_unknown_id_is_a_no_op() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(1), "2024-11-05");
        supervisor.terminate("no-such-id").await;
        assert!(supervisor.list().await.is_empty());
    }

    #[tokio::test]
    async fn transport_for_unknown_id_is_not_found() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(1), "2024-11-05");
        let err = supervisor.transport("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::ToolwardError::Server(ServerError::NotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawn_failure_leaves_terminated_entry_and_connection_failed() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(1), "2024-11-05");
        let err = supervisor
            .ensure_running(Path::new("/nonexistent/echo-tool"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ToolwardError::Server(ServerError::ConnectionFailed { .. })
        ));

        let entries = supervisor.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, ServerStatus::Terminated);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminated_entry_does_not_block_a_fresh_spawn_attempt() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(1), "2024-11-05");
        let _ = supervisor
            .ensure_running(Path::new("/nonexistent/echo-tool"))
            .await;
        let _ = supervisor
            .ensure_running(Path::new("/nonexistent/echo-tool"))
            .await;
        // Two failed attempts, two Terminated entries; dedup only applies to
        // live entries.
        let entries = supervisor.list().await;
        assert_eq!(entries.len(), 2);
    }
}
