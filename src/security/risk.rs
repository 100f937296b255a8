use serde::{Deserialize, Serialize};

use crate::action::{ActionRequest, InputSource, OutputTarget};

/// Ordinal risk tier assigned to a proposed action. Strictly ordered:
/// `Safe < Low < Medium < High`. `Medium` and above require confirmation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskTier {
    Safe,
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// Human-readable description, the sole contract the confirmation dialog
    /// needs from the engine.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Safe => "safe, read-only",
            Self::Low => "low risk, no confirmation needed",
            Self::Medium => "moderate risk, confirmation recommended",
            Self::High => "high risk, requires explicit authorization",
        }
    }
}

/// Derived verdict for one `ActionRequest`. Never persisted long-term.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub request: ActionRequest,
    pub tier: RiskTier,
    /// One entry per evaluator that produced a tier above `Safe` with a
    /// reason, in evaluator order.
    pub reasons: Vec<String>,
    pub requires_confirmation: bool,
    /// Advisory only; never used for scheduling.
    pub estimated_duration_ms: Option<u64>,
}

/// Content length above which the length evaluator reports `Medium`.
const LONG_CONTENT_THRESHOLD: usize = 10_000;

/// Upper bound on the advisory duration estimate.
const MAX_ESTIMATED_DURATION_MS: u64 = 10_000;

/// Case-insensitive substrings that force the `High` tier.
const SENSITIVE_KEYWORDS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "api key",
    "api_key",
    "secret",
    "credit card",
    "ssn",
    "social security",
    "passport",
];

/// Pure scoring function from an action's descriptive facets to a risk tier.
///
/// Five independent evaluators each contribute `(tier, optional reason)`;
/// the final tier is the maximum across them, never a sum. The engine never
/// fails: unrecognized capabilities score conservatively instead of erroring.
#[derive(Debug, Clone, Default)]
pub struct RiskEngine;

impl RiskEngine {
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn assess(&self, request: &ActionRequest) -> RiskAssessment {
        let verdicts = [
            evaluate_capability(&request.capability),
            evaluate_input_source(request.input_source),
            evaluate_output_target(request.output_target),
            evaluate_content(&request.content),
            evaluate_length(&request.content),
        ];

        let tier = verdicts
            .iter()
            .map(|(tier, _)| *tier)
            .max()
            .unwrap_or(RiskTier::Safe);
        let reasons: Vec<String> = verdicts
            .into_iter()
            .filter_map(|(_, reason)| reason)
            .collect();

        RiskAssessment {
            request: request.clone(),
            tier,
            reasons,
            requires_confirmation: tier >= RiskTier::Medium,
            estimated_duration_ms: Some(estimate_duration_ms(request)),
        }
    }
}

// ─── Evaluators ──────────────────────────────────────────────────────────────

fn evaluate_capability(capability: &str) -> (RiskTier, Option<String>) {
    match capability {
        "summarize" | "translate" | "format" => (
            RiskTier::Low,
            Some("read-only text transform".to_string()),
        ),
        c if c.starts_with("extract") => (
            RiskTier::Low,
            Some("extracts information from the source text".to_string()),
        ),
        "search" | "web_search" | "fetch" => (
            RiskTier::High,
            Some("sends data to an external service".to_string()),
        ),
        _ => (RiskTier::Medium, Some("unknown capability type".to_string())),
    }
}

fn evaluate_input_source(source: InputSource) -> (RiskTier, Option<String>) {
    match source {
        InputSource::UserEntry => (RiskTier::Safe, None),
        InputSource::Clipboard => (
            RiskTier::Low,
            Some("clipboard may contain sensitive information".to_string()),
        ),
        InputSource::PriorSelection => (
            RiskTier::Low,
            Some("reuses a prior selection".to_string()),
        ),
        InputSource::File => (RiskTier::Medium, Some("input comes from a file".to_string())),
        InputSource::NetworkPage => (
            RiskTier::Medium,
            Some("network page may contain malicious content".to_string()),
        ),
    }
}

fn evaluate_output_target(target: OutputTarget) -> (RiskTier, Option<String>) {
    match target {
        OutputTarget::Display => (RiskTier::Safe, None),
        OutputTarget::Clipboard => (
            RiskTier::Low,
            Some("result is copied to the clipboard".to_string()),
        ),
        OutputTarget::FileWrite => (
            RiskTier::High,
            Some("data will be written to the filesystem".to_string()),
        ),
        OutputTarget::NetworkSend => (
            RiskTier::High,
            Some("data will be transmitted over the network".to_string()),
        ),
    }
}

fn evaluate_content(content: &str) -> (RiskTier, Option<String>) {
    let lowered = content.to_lowercase();
    for keyword in SENSITIVE_KEYWORDS {
        if lowered.contains(keyword) {
            return (
                RiskTier::High,
                Some(format!("content mentions '{keyword}'")),
            );
        }
    }

    if contains_email(content) {
        return (RiskTier::Low, Some("email address detected".to_string()));
    }

    (RiskTier::Safe, None)
}

// A single threshold: long inputs cap at Medium from this evaluator.
fn evaluate_length(content: &str) -> (RiskTier, Option<String>) {
    if content.len() > LONG_CONTENT_THRESHOLD {
        return (
            RiskTier::Medium,
            Some(format!("content is large ({} characters)", content.len())),
        );
    }
    (RiskTier::Safe, None)
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Lightweight email shape check: `local@domain` with a dotted domain.
fn contains_email(text: &str) -> bool {
    for token in text.split_whitespace() {
        let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '@' && c != '.');
        if let Some((local, domain)) = trimmed.split_once('@')
            && !local.is_empty()
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
        {
            return true;
        }
    }
    false
}

/// Per-capability base latency plus a small multiple of content length,
/// capped. Advisory only.
fn estimate_duration_ms(request: &ActionRequest) -> u64 {
    let base = match request.capability.as_str() {
        "format" => 1_000,
        "summarize" => 2_000,
        "translate" => 2_500,
        c if c.starts_with("extract") => 1_500,
        "search" | "web_search" | "fetch" => 4_000,
        _ => 2_000,
    };
    let length_cost = (request.content.len() as u64) / 2;
    (base + length_cost).min(MAX_ESTIMATED_DURATION_MS)
}
