//! Composition of the trust & safety pipeline: admission → process → risk →
//! confirmation → call → snapshot → audit.
//!
//! Every collaborator is constructed by the caller and injected here; there
//! is no ambient global state.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use crate::action::{ActionOutcome, ActionRequest};
use crate::error::{AdmissionError, Result, RpcError, ServerError, ToolwardError, UndoError};
use crate::security::approval::{ApprovalBroker, ApprovalDecision, ApprovalRequest};
use crate::security::risk::{RiskAssessment, RiskEngine};
use crate::security::whitelist::WhitelistGate;
use crate::server::ProcessSupervisor;
use crate::undo::ReversibleOperationStore;

pub struct Orchestrator {
    whitelist: Arc<WhitelistGate>,
    supervisor: Arc<ProcessSupervisor>,
    risk: RiskEngine,
    undo: Arc<ReversibleOperationStore>,
    approvals: Arc<dyn ApprovalBroker>,
    audit_dir: PathBuf,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        whitelist: Arc<WhitelistGate>,
        supervisor: Arc<ProcessSupervisor>,
        risk: RiskEngine,
        undo: Arc<ReversibleOperationStore>,
        approvals: Arc<dyn ApprovalBroker>,
        audit_dir: PathBuf,
    ) -> Self {
        Self {
            whitelist,
            supervisor,
            risk,
            undo,
            approvals,
            audit_dir,
        }
    }

    /// Score a request without executing anything. Non-tool actions (no
    /// server path) go through here too.
    #[must_use]
    pub fn assess(&self, request: &ActionRequest) -> RiskAssessment {
        self.risk.assess(request)
    }

    /// Run the full pipeline for one action request.
    pub async fn execute(&self, request: ActionRequest) -> Result<ActionOutcome> {
        let Some(server_path) = request.server_path.clone() else {
            return Err(ServerError::InvalidArguments {
                message: "action request has no target server".to_string(),
            }
            .into());
        };

        // Admission is terminal: no spawn is ever attempted for a rejected
        // path.
        if !self.whitelist.contains(&server_path) {
            let error = AdmissionError::NotWhitelisted {
                path: server_path.to_string_lossy().to_string(),
            };
            self.audit(&request, None, "rejected", &error.to_string())
                .await;
            return Err(error.into());
        }

        let server_id = self.supervisor.ensure_running(&server_path).await?;

        let assessment = self.risk.assess(&request);
        if assessment.requires_confirmation {
            let approval = ApprovalRequest::from_assessment(&request, &assessment);
            let decision = match self.approvals.request_approval(&approval).await {
                Ok(decision) => decision,
                // Broker failure or cancellation never silently proceeds.
                Err(error) => ApprovalDecision::Denied {
                    reason: format!("approval unavailable: {error}"),
                },
            };
            if let ApprovalDecision::Denied { reason } = decision {
                tracing::info!(capability = %request.capability, %reason, "action denied");
                self.audit(&request, Some(&assessment), "denied", &reason)
                    .await;
                return Ok(ActionOutcome::Denied { assessment, reason });
            }
        }

        let transport = self.supervisor.transport(&server_id).await?;
        let output = match transport
            .call_tool(&request.capability, request.arguments.clone())
            .await
        {
            Ok(output) => output,
            Err(RpcError::ConnectionClosed) => {
                self.supervisor
                    .invalidate(&server_id, &RpcError::ConnectionClosed)
                    .await;
                let error = ServerError::ProcessTerminated {
                    id: server_id.clone(),
                };
                self.audit(&request, Some(&assessment), "failed", &error.to_string())
                    .await;
                return Err(error.into());
            }
            Err(error) => {
                self.audit(&request, Some(&assessment), "failed", &error.to_string())
                    .await;
                return Err(error.into());
            }
        };
        self.supervisor.touch(&server_id).await;

        // Mutating actions get their before/after snapshot before the result
        // is handed back: the write and the snapshot are one step.
        let snapshot_id = match &request.target_file {
            Some(target) if request.is_mutating() => {
                let target = target.clone();
                Some(self.apply_file_write(&request, &target, &output.text).await?)
            }
            _ => None,
        };

        let duration_ms = u64::try_from(output.duration.as_millis()).unwrap_or(u64::MAX);
        self.audit(&request, Some(&assessment), "completed", "")
            .await;

        Ok(ActionOutcome::Completed {
            output: output.text,
            duration_ms,
            assessment,
            snapshot_id,
        })
    }

    pub async fn undo(&self, snapshot_id: &str) -> crate::undo::UndoOutcome {
        self.undo.undo(snapshot_id).await
    }

    /// Write the tool output to the request's target file, snapshotting the
    /// prior content first. An absent target file counts as empty original
    /// content (the write creates it).
    async fn apply_file_write(
        &self,
        request: &ActionRequest,
        target: &Path,
        output: &str,
    ) -> Result<String> {
        let original = match tokio::fs::read_to_string(target).await {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(error) => {
                return Err(UndoError::ReadFailed {
                    path: target.to_string_lossy().to_string(),
                    message: error.to_string(),
                }
                .into());
            }
        };

        tokio::fs::write(target, output)
            .await
            .map_err(|error| UndoError::WriteFailed {
                path: target.to_string_lossy().to_string(),
                message: error.to_string(),
            })?;

        let description = format!("{} -> {}", request.capability, target.display());
        self.undo
            .create(
                &request.task_id,
                &request.capability,
                Some(target.to_path_buf()),
                original,
                output.to_string(),
                &description,
            )
            .await
    }

    /// Append one structured audit record. Best-effort: an unwritable audit
    /// log is logged, never fatal to the action itself.
    async fn audit(
        &self,
        request: &ActionRequest,
        assessment: Option<&RiskAssessment>,
        outcome: &str,
        detail: &str,
    ) {
        let record = serde_json::json!({
            "recorded_at": Utc::now().to_rfc3339(),
            "capability": request.capability,
            "server": request.server_path.as_ref().map(|p| p.display().to_string()),
            "input_source": request.input_source,
            "output_target": request.output_target,
            "tier": assessment.map(|a| a.tier),
            "reasons": assessment.map(|a| a.reasons.clone()),
            "outcome": outcome,
            "detail": detail,
        });

        if let Err(error) = append_audit_record(&self.audit_dir, &record).await {
            tracing::warn!(%error, "failed to append audit record");
        }
    }
}

async fn append_audit_record(
    audit_dir: &Path,
    record: &serde_json::Value,
) -> std::result::Result<(), ToolwardError> {
    tokio::fs::create_dir_all(audit_dir)
        .await
        .map_err(anyhow::Error::from)?;

    let date = Utc::now().format("%Y-%m-%d").to_string();
    let path = audit_dir.join(format!("{date}.jsonl"));

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .map_err(anyhow::Error::from)?;

    file.write_all(record.to_string().as_bytes())
        .await
        .map_err(anyhow::Error::from)?;
    file.write_all(b"\n").await.map_err(anyhow::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{InputSource, OutputTarget};
    use crate::security::approval::AutoDenyBroker;
    use crate::undo::DEFAULT_TTL_DAYS;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn orchestrator(tmp: &TempDir) -> Orchestrator {
        let whitelist = Arc::new(WhitelistGate::load(&tmp.path().join("whitelist.json")));
        let supervisor = Arc::new(ProcessSupervisor::new(
            Duration::from_secs(1),
            "2024-11-05",
        ));
        let undo = Arc::new(
            ReversibleOperationStore::open(&tmp.path().join("undo"), DEFAULT_TTL_DAYS)
                .await
                .expect("open store"),
        );
        Orchestrator::new(
            whitelist,
            supervisor,
            RiskEngine::new(),
            undo,
            Arc::new(AutoDenyBroker {
                reason: "test".to_string(),
            }),
            tmp.path().join("audit"),
        )
    }

    #[tokio::test]
    async fn request_without_server_is_invalid_arguments() {
        let tmp = TempDir::new().expect("tempdir");
        let orchestrator = orchestrator(&tmp).await;
        let request = ActionRequest::new(
            "summarize",
            "text",
            InputSource::UserEntry,
            OutputTarget::Display,
        );
        let err = orchestrator.execute(request).await.unwrap_err();
        assert!(matches!(
            err,
            ToolwardError::Server(ServerError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn unlisted_server_is_rejected_before_any_spawn() {
        let tmp = TempDir::new().expect("tempdir");
        let orchestrator = orchestrator(&tmp).await;
        // Path deliberately nonexistent: a spawn attempt would surface as
        // ConnectionFailed, so NotWhitelisted proves no spawn happened.
        let request = ActionRequest::new(
            "summarize",
            "text",
            InputSource::UserEntry,
            OutputTarget::Display,
        )
        .with_server("/nonexistent/echo-tool");

        let err = orchestrator.execute(request).await.unwrap_err();
        assert!(matches!(
            err,
            ToolwardError::Admission(AdmissionError::NotWhitelisted { .. })
        ));
    }

    #[tokio::test]
    async fn non_tool_requests_are_still_risk_scored() {
        let tmp = TempDir::new().expect("tempdir");
        let orchestrator = orchestrator(&tmp).await;
        let request = ActionRequest::new(
            "summarize",
            "my password is hunter2",
            InputSource::UserEntry,
            OutputTarget::Display,
        );
        let assessment = orchestrator.assess(&request);
        assert_eq!(assessment.tier, crate::security::risk::RiskTier::High);
    }
}
