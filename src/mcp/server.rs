//! MCP Server implementation
//!
//! Owns the line-delimited stdio transport. One sequential reader feeds
//! every message to its own task; responses may therefore complete out of
//! order and are correlated by `id` only. All writes go through a single
//! [`OutputSink`] so concurrent responses never interleave mid-line.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use crate::error::{describe_panic, ProtocolError, Result, TransportError};
use crate::mcp::dispatcher::{Dispatcher, ServerHooks};
use crate::mcp::types::*;

/// Consecutive read failures tolerated before the loop gives up
pub const MAX_CONSECUTIVE_READ_FAILURES: usize = 16;

/// Shared, mutually exclusive line writer
pub struct OutputSink<W> {
    writer: Arc<Mutex<W>>,
    hooks: ServerHooks,
}

impl<W> Clone for OutputSink<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            hooks: self.hooks.clone(),
        }
    }
}

impl<W> OutputSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            hooks: ServerHooks::default(),
        }
    }

    fn with_hooks(&self, hooks: ServerHooks) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            hooks,
        }
    }

    /// Serialize `message` and write it as one flushed line
    pub async fn send<T: Serialize>(&self, message: &T) -> std::result::Result<(), TransportError> {
        let value = serde_json::to_value(message).map_err(|e| TransportError::Write {
            message: e.to_string(),
        })?;
        let mut line = value.to_string();
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::Write {
                message: e.to_string(),
            })?;
        writer.flush().await.map_err(|e| TransportError::Write {
            message: e.to_string(),
        })?;
        drop(writer);

        self.hooks.sent(&value);
        trace!(len = line.len(), "wrote message");
        Ok(())
    }
}

impl OutputSink<Vec<u8>> {
    /// Everything written so far, for in-memory sinks
    pub async fn contents(&self) -> String {
        String::from_utf8_lossy(&self.writer.lock().await).into_owned()
    }
}

/// MCP server over a line-delimited transport
pub struct McpServer {
    dispatcher: Arc<Dispatcher>,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Run the server on stdio
    pub async fn run_stdio(&self) -> Result<()> {
        let reader = BufReader::new(tokio::io::stdin());
        let sink = OutputSink::new(tokio::io::stdout());
        self.serve(reader, sink).await?;
        Ok(())
    }

    /// Read messages until end of input, then wait for in-flight work
    pub async fn serve<R, W>(
        &self,
        mut reader: R,
        sink: OutputSink<W>,
    ) -> std::result::Result<(), TransportError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let sink = sink.with_hooks(self.dispatcher.hooks().clone());
        let mut tasks = JoinSet::new();
        let mut buf = Vec::new();
        let mut read_failures = 0;
        let mut outcome = Ok(());

        info!(
            name = %self.dispatcher.config().name,
            tools = self.dispatcher.registry().len(),
            "server started"
        );

        loop {
            buf.clear();
            let message = match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    read_failures = 0;
                    match std::str::from_utf8(&buf) {
                        Ok(line) if line.trim().is_empty() => continue,
                        Ok(line) => self.decode(line.trim()),
                        Err(e) => IncomingMessage::Malformed(format!("invalid UTF-8: {e}")),
                    }
                }
                Err(e) => {
                    read_failures += 1;
                    warn!(error = %e, attempt = read_failures, "failed to read input");
                    if read_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                        error!(count = read_failures, "giving up on input");
                        outcome = Err(TransportError::TooManyReadFailures {
                            count: read_failures,
                        });
                        break;
                    }
                    IncomingMessage::Malformed(format!("read failed: {e}"))
                }
            };

            self.schedule(&mut tasks, message, &sink);

            while let Some(finished) = tasks.try_join_next() {
                log_task_exit(finished);
            }
        }

        info!(in_flight = tasks.len(), "stopped reading, draining in-flight tasks");
        while let Some(finished) = tasks.join_next().await {
            log_task_exit(finished);
        }
        outcome
    }

    fn decode(&self, line: &str) -> IncomingMessage {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => {
                self.dispatcher.hooks().received(&value);
                IncomingMessage::classify(value)
            }
            Err(e) => IncomingMessage::Malformed(e.to_string()),
        }
    }

    fn schedule<W>(&self, tasks: &mut JoinSet<()>, message: IncomingMessage, sink: &OutputSink<W>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        match message {
            IncomingMessage::Request(request) => {
                debug!(method = %request.method, id = %request.id, "received request");
                let dispatcher = Arc::clone(&self.dispatcher);
                let sink = sink.clone();
                tasks.spawn(handle_request(dispatcher, sink, request));
            }
            IncomingMessage::Notification(notification) => {
                debug!(method = %notification.method, "received notification");
                let dispatcher = Arc::clone(&self.dispatcher);
                tasks.spawn(async move { dispatcher.handle_notification(&notification) });
            }
            IncomingMessage::Invalid { id, message } => {
                debug!(error = %message, "rejecting malformed request envelope");
                let sink = sink.clone();
                tasks.spawn(async move {
                    let err = ProtocolError::InvalidRequest { message };
                    let response = JsonRpcResponse::error(id, err.into());
                    if let Err(e) = sink.send(&response).await {
                        error!(error = %e, "failed to write invalid request error");
                    }
                });
            }
            IncomingMessage::Malformed(message) => {
                warn!(error = %message, "failed to parse message");
                let sink = sink.clone();
                tasks.spawn(async move {
                    let err = ProtocolError::ParseError { message };
                    let response = JsonRpcResponse::error(None, err.into());
                    if let Err(e) = sink.send(&response).await {
                        error!(error = %e, "failed to write parse error");
                    }
                });
            }
            IncomingMessage::Unrecognized(value) => {
                debug!(payload = %value, "ignoring message with unrecognized shape");
            }
        }
    }
}

/// Dispatch one request, write its response, then complete the handshake
/// when the request was `initialize`
async fn handle_request<W>(dispatcher: Arc<Dispatcher>, sink: OutputSink<W>, request: JsonRpcRequest)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let id = request.id.clone();
    let init_params = (request.method == methods::INITIALIZE).then(|| request.params.clone());

    let worker = Arc::clone(&dispatcher);
    let response = match tokio::spawn(async move { worker.handle_request(request).await }).await {
        Ok(response) => response,
        Err(e) => {
            let message = if e.is_panic() {
                describe_panic(e.into_panic())
            } else {
                e.to_string()
            };
            error!(id = %id, error = %message, "request handling panicked");
            JsonRpcResponse::error(Some(id), ProtocolError::Internal { message }.into())
        }
    };

    if let Err(e) = sink.send(&response).await {
        error!(error = %e, "failed to write response");
        return;
    }

    if let (Some(params), false) = (init_params, response.is_error()) {
        for notification in dispatcher.run_initialization(params).await {
            if let Err(e) = sink.send(&notification).await {
                error!(error = %e, method = %notification.method, "failed to write notification");
                break;
            }
        }
    }
}

fn log_task_exit(result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        error!(error = %e, "message task aborted");
    }
}
