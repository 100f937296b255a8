//! Timeout discipline for every receive on the wire: race the operation
//! against a sleep and cancel the loser. Used by both the handshake and the
//! tool-call path.

use std::future::Future;
use std::time::Duration;

use crate::error::RpcError;

/// Run `operation` for at most `duration`. On expiry the operation is
/// dropped (cancelled) and a typed `Timeout` comes back; the underlying
/// process is left running, since a slow response does not imply a dead one.
pub async fn with_timeout<T, F>(duration: Duration, operation: F) -> Result<T, RpcError>
where
    F: Future<Output = Result<T, RpcError>>,
{
    match tokio::time::timeout(duration, operation).await {
        Ok(result) => result,
        Err(_) => Err(RpcError::Timeout {
            timeout_secs: duration.as_secs(),
        }),
    }
}
