pub mod supervisor;
pub mod types;

pub use supervisor::ProcessSupervisor;
pub use types::{ServerStatus, ToolServer, ToolServerInfo, TrustTier};
