pub mod protocol;
pub mod timeout;
pub mod transport;

pub use protocol::{DEFAULT_PROTOCOL_VERSION, Handshake, JsonRpcRequest, JsonRpcResponse};
pub use timeout::with_timeout;
pub use transport::{StdioTransport, ToolCallOutput};
