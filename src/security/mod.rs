pub mod approval;
pub mod risk;
pub mod whitelist;

pub use approval::{
    ApprovalBroker, ApprovalDecision, ApprovalRequest, AutoApproveBroker, AutoDenyBroker,
    CliApprovalBroker, summarize_args,
};
pub use risk::{RiskAssessment, RiskEngine, RiskTier};
pub use whitelist::WhitelistGate;
