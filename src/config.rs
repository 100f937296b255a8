use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::rpc::DEFAULT_PROTOCOL_VERSION;
use crate::undo::DEFAULT_TTL_DAYS;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub undo: UndoConfig,

    #[serde(default)]
    pub whitelist: WhitelistConfig,

    #[serde(default)]
    pub approval: ApprovalConfig,
}

// ── RPC transport ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Upper bound on every receive on the wire.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_protocol_version() -> String {
    DEFAULT_PROTOCOL_VERSION.to_string()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            protocol_version: default_protocol_version(),
        }
    }
}

// ── Undo store ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoConfig {
    #[serde(default = "default_ttl_days")]
    pub ttl_days: i64,
    /// Defaults to `<workspace>/undo` when unset.
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
}

fn default_ttl_days() -> i64 {
    DEFAULT_TTL_DAYS
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
            snapshot_dir: None,
        }
    }
}

// ── Whitelist ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WhitelistConfig {
    /// Defaults to `<workspace>/whitelist.json` when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// ── Approval ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    #[default]
    Cli,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApprovalConfig {
    #[serde(default)]
    pub mode: ApprovalMode,
}

// ── Loading ───────────────────────────────────────────────────────

impl Config {
    /// Load from `~/.toolward/config.toml`. An absent file yields defaults;
    /// a malformed one is an error rather than a silent fallback.
    pub fn load() -> Result<Self, ConfigError> {
        let home = UserDirs::new()
            .ok_or_else(|| ConfigError::Load("cannot determine home directory".to_string()))?;
        let workspace_dir = home.home_dir().join(".toolward");
        let config_path = workspace_dir.join("config.toml");
        Self::load_from(&config_path, &workspace_dir)
    }

    pub fn load_from(config_path: &Path, workspace_dir: &Path) -> Result<Self, ConfigError> {
        let mut config = match fs::read_to_string(config_path) {
            Ok(content) => toml::from_str::<Self>(&content)
                .map_err(|e| ConfigError::Load(format!("{}: {e}", config_path.display())))?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(error) => return Err(ConfigError::Io(error)),
        };

        config.workspace_dir = workspace_dir.to_path_buf();
        config.config_path = config_path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "rpc.timeout_secs must be positive".to_string(),
            ));
        }
        if self.undo.ttl_days <= 0 {
            return Err(ConfigError::Validation(
                "undo.ttl_days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn whitelist_path(&self) -> PathBuf {
        self.whitelist
            .path
            .clone()
            .unwrap_or_else(|| self.workspace_dir.join("whitelist.json"))
    }

    #[must_use]
    pub fn snapshot_dir(&self) -> PathBuf {
        self.undo
            .snapshot_dir
            .clone()
            .unwrap_or_else(|| self.workspace_dir.join("undo"))
    }

    #[must_use]
    pub fn audit_dir(&self) -> PathBuf {
        self.workspace_dir.join("audit")
    }

    #[must_use]
    pub fn rpc_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.rpc.timeout_secs)
    }
}
