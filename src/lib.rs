#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod action;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod rpc;
pub mod security;
pub mod server;
pub mod undo;

pub use action::{ActionOutcome, ActionRequest, InputSource, OutputTarget};
pub use config::Config;
pub use error::{Result, ToolwardError};
pub use orchestrator::Orchestrator;
pub use security::{RiskAssessment, RiskEngine, RiskTier, WhitelistGate};
pub use server::ProcessSupervisor;
pub use undo::{OperationSnapshot, ReversibleOperationStore, UndoOutcome};
