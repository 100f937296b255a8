use crate::action::ActionRequest;
use crate::security::risk::{RiskAssessment, RiskTier};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// What the confirmation dialog gets to show: the action in human terms plus
/// the tier, its description, and the contributing reasons.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub capability: String,
    pub args_summary: String,
    pub tier: RiskTier,
    pub reasons: Vec<String>,
    pub server_path: Option<String>,
}

impl ApprovalRequest {
    #[must_use]
    pub fn from_assessment(request: &ActionRequest, assessment: &RiskAssessment) -> Self {
        Self {
            capability: request.capability.clone(),
            args_summary: summarize_args(request),
            tier: assessment.tier,
            reasons: assessment.reasons.clone(),
            server_path: request
                .server_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Denied { reason: String },
}

pub trait ApprovalBroker: Send + Sync {
    fn request_approval<'a>(
        &'a self,
        request: &'a ApprovalRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ApprovalDecision>> + Send + 'a>>;
}

/// Denies everything. The right broker for non-interactive contexts where no
/// human can answer.
pub struct AutoDenyBroker {
    pub reason: String,
}

impl ApprovalBroker for AutoDenyBroker {
    fn request_approval<'a>(
        &'a self,
        _request: &'a ApprovalRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ApprovalDecision>> + Send + 'a>> {
        Box::pin(async move {
            Ok(ApprovalDecision::Denied {
                reason: self.reason.clone(),
            })
        })
    }
}

/// Approves everything. Only for trusted automation and tests.
pub struct AutoApproveBroker;

impl ApprovalBroker for AutoApproveBroker {
    fn request_approval<'a>(
        &'a self,
        _request: &'a ApprovalRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ApprovalDecision>> + Send + 'a>> {
        Box::pin(async move { Ok(ApprovalDecision::Approved) })
    }
}

/// Interactive terminal confirmation. An unanswered prompt times out to a
/// denial, never to silently proceeding.
pub struct CliApprovalBroker {
    timeout: Duration,
}

impl CliApprovalBroker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn default_timeout() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ApprovalBroker for CliApprovalBroker {
    fn request_approval<'a>(
        &'a self,
        request: &'a ApprovalRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ApprovalDecision>> + Send + 'a>> {
        Box::pin(async move {
            eprintln!();
            eprintln!("┌─ Action Approval Required ───────────────────────");
            eprintln!("│ Capability: {}", request.capability);
            eprintln!("│ Args:       {}", request.args_summary);
            if let Some(server) = &request.server_path {
                eprintln!("│ Server:     {server}");
            }
            eprintln!(
                "│ Risk:       {} ({})",
                request.tier,
                request.tier.description()
            );
            for reason in &request.reasons {
                eprintln!("│   - {reason}");
            }
            eprintln!("├──────────────────────────────────────────────────");
            eprintln!("│ [A]llow  [D]eny");
            eprintln!("└──────────────────────────────────────────────────");
            eprint!("  > ");

            let decision = tokio::time::timeout(self.timeout, read_single_char()).await;

            match decision {
                Ok(Ok(ch)) => match ch.to_ascii_lowercase() {
                    'a' => Ok(ApprovalDecision::Approved),
                    'd' => Ok(ApprovalDecision::Denied {
                        reason: "denied by user".to_string(),
                    }),
                    _ => Ok(ApprovalDecision::Denied {
                        reason: format!("unrecognized input: '{ch}'"),
                    }),
                },
                Ok(Err(e)) => Ok(ApprovalDecision::Denied {
                    reason: format!("input error: {e}"),
                }),
                Err(_) => Ok(ApprovalDecision::Denied {
                    reason: "approval timed out".to_string(),
                }),
            }
        })
    }
}

async fn read_single_char() -> anyhow::Result<char> {
    // stdin is blocking
    let ch = tokio::task::spawn_blocking(|| {
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        input
            .trim()
            .chars()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no input received"))
    })
    .await??;
    Ok(ch)
}

/// Compact argument rendering for the prompt; long content is elided.
#[must_use]
pub fn summarize_args(request: &ActionRequest) -> String {
    let args = serde_json::to_string(&request.arguments).unwrap_or_default();
    let content_note = if request.content.is_empty() {
        String::new()
    } else if request.content.len() <= 60 {
        format!(" content: {:?}", request.content)
    } else {
        format!(" content: {} chars", request.content.len())
    };
    format!("{args}{content_note}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{InputSource, OutputTarget};
    use crate::security::risk::RiskEngine;

    fn high_risk_approval_request() -> ApprovalRequest {
        let request = ActionRequest::new(
            "translate",
            "my password is hunter2",
            InputSource::Clipboard,
            OutputTarget::FileWrite,
        );
        let assessment = RiskEngine::new().assess(&request);
        ApprovalRequest::from_assessment(&request, &assessment)
    }

    #[tokio::test]
    async fn auto_deny_broker_denies_all_requests() {
        let broker = AutoDenyBroker {
            reason: "non-interactive context".to_string(),
        };
        let decision = broker
            .request_approval(&high_risk_approval_request())
            .await
            .expect("auto deny broker should not fail");

        assert_eq!(
            decision,
            ApprovalDecision::Denied {
                reason: "non-interactive context".to_string()
            }
        );
    }

    #[tokio::test]
    async fn auto_approve_broker_approves() {
        let decision = AutoApproveBroker
            .request_approval(&high_risk_approval_request())
            .await
            .expect("auto approve broker should not fail");
        assert_eq!(decision, ApprovalDecision::Approved);
    }

    #[test]
    fn approval_request_carries_tier_and_reasons() {
        let request = high_risk_approval_request();
        assert_eq!(request.tier, RiskTier::High);
        assert!(!request.reasons.is_empty());
        assert!(request.reasons.iter().any(|r| r.contains("password")));
    }

    #[test]
    fn summarize_args_elides_long_content() {
        let request = ActionRequest::new(
            "summarize",
            &"a".repeat(500),
            InputSource::UserEntry,
            OutputTarget::Display,
        );
        let summary = summarize_args(&request);
        assert!(summary.contains("500 chars"));
        assert!(!summary.contains(&"a".repeat(100)));
    }

    #[test]
    fn summarize_args_shows_short_content() {
        let request = ActionRequest::new(
            "summarize",
            "hello",
            InputSource::UserEntry,
            OutputTarget::Display,
        );
        assert!(summarize_args(&request).contains("hello"));
    }

    #[test]
    fn cli_approval_broker_default_timeout() {
        let broker = CliApprovalBroker::default_timeout();
        assert_eq!(broker.timeout, Duration::from_secs(30));
    }
}
