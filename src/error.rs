use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `Toolward`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum ToolwardError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Admission (whitelist) ───────────────────────────────────────────
    #[error("admission: {0}")]
    Admission(#[from] AdmissionError),

    // ── Server registry / lifecycle ─────────────────────────────────────
    #[error("server: {0}")]
    Server(#[from] ServerError),

    // ── JSON-RPC transport ──────────────────────────────────────────────
    #[error("rpc: {0}")]
    Rpc(#[from] RpcError),

    // ── Undo / snapshot store ───────────────────────────────────────────
    #[error("undo: {0}")]
    Undo(#[from] UndoError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Admission errors ────────────────────────────────────────────────────────

/// Admission failures are terminal: the orchestrator never retries them and
/// never attempts a spawn after one.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("executable '{path}' is not whitelisted")]
    NotWhitelisted { path: String },
}

// ─── Server registry errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server {id} not found")]
    NotFound { id: String },

    #[error("failed to start '{path}': {message}")]
    ConnectionFailed { path: String, message: String },

    #[error("server {id} process terminated")]
    ProcessTerminated { id: String },

    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },
}

// ─── JSON-RPC transport errors ───────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("no response within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("server error: {message}")]
    Server { message: String },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Undo / snapshot errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum UndoError {
    #[error("snapshot {id} not found")]
    SnapshotNotFound { id: String },

    #[error("snapshot {id} has expired")]
    SnapshotExpired { id: String },

    #[error("target file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to write '{path}': {message}")]
    WriteFailed { path: String, message: String },

    #[error("failed to read '{path}': {message}")]
    ReadFailed { path: String, message: String },
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, ToolwardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_whitelisted_displays_path() {
        let err = ToolwardError::Admission(AdmissionError::NotWhitelisted {
            path: "/usr/local/bin/rogue".into(),
        });
        assert!(err.to_string().contains("/usr/local/bin/rogue"));
        assert!(err.to_string().contains("not whitelisted"));
    }

    #[test]
    fn timeout_displays_seconds() {
        let err = ToolwardError::Rpc(RpcError::Timeout { timeout_secs: 30 });
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn connection_failed_displays_both_fields() {
        let err = ToolwardError::Server(ServerError::ConnectionFailed {
            path: "/bin/echo-tool".into(),
            message: "no such file".into(),
        });
        assert!(err.to_string().contains("/bin/echo-tool"));
        assert!(err.to_string().contains("no such file"));
    }

    #[test]
    fn snapshot_expired_displays_id() {
        let err = ToolwardError::Undo(UndoError::SnapshotExpired { id: "abc-123".into() });
        assert!(err.to_string().contains("abc-123"));
        assert!(err.to_string().contains("expired"));
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let err: ToolwardError = anyhow_err.into();
        assert!(err.to_string().contains("something went wrong"));
    }
}
