use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::security::risk::RiskAssessment;

/// Where the content of an action came from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InputSource {
    UserEntry,
    Clipboard,
    File,
    NetworkPage,
    PriorSelection,
}

/// Where the result of an action is going.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputTarget {
    Display,
    Clipboard,
    FileWrite,
    NetworkSend,
}

/// A single proposed tool invocation. Immutable once built; the risk engine
/// reads it, never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Executable path of the target tool server. `None` for non-tool
    /// actions that are still subject to risk scoring.
    pub server_path: Option<PathBuf>,
    pub capability: String,
    pub arguments: serde_json::Value,
    /// Free text scanned by the sensitivity evaluator.
    pub content: String,
    pub input_source: InputSource,
    pub output_target: OutputTarget,
    /// Destination for mutating file-write actions.
    pub target_file: Option<PathBuf>,
    /// Task that owns any snapshot produced by this action.
    pub task_id: String,
    pub requested_at: DateTime<Utc>,
}

impl ActionRequest {
    pub fn new(
        capability: &str,
        content: &str,
        input_source: InputSource,
        output_target: OutputTarget,
    ) -> Self {
        Self {
            server_path: None,
            capability: capability.to_string(),
            arguments: serde_json::json!({}),
            content: content.to_string(),
            input_source,
            output_target,
            target_file: None,
            task_id: uuid::Uuid::new_v4().to_string(),
            requested_at: Utc::now(),
        }
    }

    pub fn with_server(mut self, path: impl Into<PathBuf>) -> Self {
        self.server_path = Some(path.into());
        self
    }

    pub fn with_arguments(mut self, arguments: serde_json::Value) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_target_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_file = Some(path.into());
        self
    }

    /// A mutating action is one whose result lands in the filesystem.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        self.output_target == OutputTarget::FileWrite && self.target_file.is_some()
    }
}

/// What the orchestrator hands back to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Completed {
        output: String,
        duration_ms: u64,
        assessment: RiskAssessment,
        snapshot_id: Option<String>,
    },
    Denied {
        assessment: RiskAssessment,
        reason: String,
    },
}
