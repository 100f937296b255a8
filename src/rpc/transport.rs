//! Process-backed JSON-RPC transport.
//!
//! Spawns a whitelisted helper executable with three redirected streams and
//! exchanges newline-delimited frames over its pipes. Responses are
//! dispatched to waiters through a pending-request map keyed by the JSON-RPC
//! `id`, so overlapping calls to the same server are safe.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};

use super::protocol::{
    Handshake, JsonRpcRequest, JsonRpcResponse, parse_handshake, parse_response,
    parse_tool_output,
};
use super::timeout::with_timeout;
use crate::error::RpcError;

/// Successful `tools/call` exchange: joined text plus elapsed wall time.
#[derive(Debug, Clone)]
pub struct ToolCallOutput {
    pub text: String,
    pub duration: Duration,
}

type Waiter = oneshot::Sender<Result<JsonRpcResponse, RpcError>>;
type PendingMap = Arc<Mutex<HashMap<i64, Waiter>>>;

#[derive(Debug)]
pub struct StdioTransport {
    sender: mpsc::Sender<String>,
    pending: PendingMap,
    next_id: AtomicI64,
    timeout: Duration,
    alive: Arc<AtomicBool>,
    child: Mutex<Child>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl StdioTransport {
    const OUTBOX_DEPTH: usize = 64;

    /// Spawn the executable and wire up the writer, reader, and stderr
    /// drains. Spawn failures surface as I/O errors for the supervisor to
    /// classify.
    pub async fn spawn(path: &Path, timeout: Duration) -> Result<Self, RpcError> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RpcError::Io(std::io::Error::other("child stdin unavailable")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RpcError::Io(std::io::Error::other("child stdout unavailable")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RpcError::Io(std::io::Error::other("child stderr unavailable")))?;

        let (sender, mut outbox) = mpsc::channel::<String>(Self::OUTBOX_DEPTH);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let writer = tokio::spawn(async move {
            while let Some(line) = outbox.recv().await {
                if stdin.write_all(line.as_bytes()).await.is_err()
                    || stdin.write_all(b"\n").await.is_err()
                    || stdin.flush().await.is_err()
                {
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_alive = alive.clone();
        let server = path.display().to_string();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match parse_response(&line) {
                        Ok(response) => {
                            dispatch(&reader_pending, response).await;
                        }
                        Err(error) => {
                            // The stream itself is broken; every waiter gets
                            // the protocol failure rather than a timeout.
                            tracing::warn!(%server, %error, "unparsable frame from tool server");
                            fail_all(&reader_pending, || {
                                RpcError::InvalidResponse(format!("unparsable frame: {error}"))
                            })
                            .await;
                        }
                    },
                    Ok(None) => {
                        tracing::debug!(%server, "tool server closed its output pipe");
                        reader_alive.store(false, Ordering::SeqCst);
                        fail_all(&reader_pending, || RpcError::ConnectionClosed).await;
                        break;
                    }
                    Err(error) => {
                        tracing::warn!(%server, %error, "read error from tool server");
                        reader_alive.store(false, Ordering::SeqCst);
                        fail_all(&reader_pending, || RpcError::ConnectionClosed).await;
                        break;
                    }
                }
            }
        });

        let stderr_server = path.display().to_string();
        let stderr_drain = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(server = %stderr_server, %line, "tool server stderr");
            }
        });

        Ok(Self {
            sender,
            pending,
            next_id: AtomicI64::new(1),
            timeout,
            alive,
            child: Mutex::new(child),
            tasks: vec![writer, reader, stderr_drain],
        })
    }

    /// Perform the `initialize` handshake and return the declared tool list.
    pub async fn initialize(&self, protocol_version: &str) -> Result<Handshake, RpcError> {
        let request = JsonRpcRequest::initialize(self.take_id(), protocol_version);
        let response = self.call(request).await?;
        parse_handshake(&response)
    }

    /// Invoke one tool and join its text output.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallOutput, RpcError> {
        let started = Instant::now();
        let request = JsonRpcRequest::tool_call(self.take_id(), name, arguments);
        let response = self.call(request).await?;
        let text = parse_tool_output(&response)?;
        Ok(ToolCallOutput {
            text,
            duration: started.elapsed(),
        })
    }

    /// Whether the child still holds its side of the pipes.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst) && !self.sender.is_closed()
    }

    /// Kill the child process. Safe to call on an already-dead child.
    pub async fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        let mut child = self.child.lock().await;
        if let Err(error) = child.kill().await {
            tracing::debug!(%error, "kill on tool server failed; probably already exited");
        }
    }

    fn take_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send one request and wait for its correlated response, bounded by the
    /// configured timeout. A timeout abandons the waiter but leaves the
    /// process running.
    async fn call(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        let id = request.id;
        let line = request.to_line()?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if self.sender.send(line).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(RpcError::ConnectionClosed);
        }

        let result = with_timeout(self.timeout, async {
            rx.await.map_err(|_| RpcError::ConnectionClosed)?
        })
        .await;

        if matches!(result, Err(RpcError::Timeout { .. })) {
            self.pending.lock().await.remove(&id);
        }
        result
    }
}

async fn dispatch(pending: &PendingMap, response: JsonRpcResponse) {
    let Some(id) = response.correlation_id() else {
        tracing::warn!("response without integer id; dropping");
        return;
    };
    let waiter = pending.lock().await.remove(&id);
    match waiter {
        Some(tx) => {
            if tx.send(Ok(response)).is_err() {
                tracing::debug!(id, "waiter for response already gone");
            }
        }
        None => {
            tracing::warn!(id, "response with no pending request; dropping");
        }
    }
}

async fn fail_all(pending: &PendingMap, make_error: impl Fn() -> RpcError) {
    let waiters: Vec<Waiter> = {
        let mut map = pending.lock().await;
        map.drain().map(|(_, tx)| tx).collect()
    };
    for tx in waiters {
        let _ = tx.send(Err(make_error()));
    }
}
