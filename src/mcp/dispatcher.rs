//! JSON-RPC method dispatch
//!
//! Routes each request by `method` to the registry or server operation and
//! produces exactly one response. The only state carried across messages is
//! the one-shot initialize handshake.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ProtocolError;
use crate::mcp::types::*;
use crate::tools::definition::json_type_name;
use crate::tools::{invoke_tool, Arguments, InvocationResult, ToolRegistry};

/// Boxed future returned by an initialization callback
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// User-supplied callback run after the `initialize` response has been sent.
/// Receives the client's `initialize` params.
pub type InitCallback = Arc<dyn Fn(Option<Value>) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// Observer invoked with a raw protocol message
pub type MessageHook = Arc<dyn Fn(&Value) + Send + Sync>;

/// Observability hooks around the transport
#[derive(Clone, Default)]
pub struct ServerHooks {
    pub on_receive: Option<MessageHook>,
    pub on_send: Option<MessageHook>,
}

impl ServerHooks {
    pub fn received(&self, message: &Value) {
        if let Some(hook) = &self.on_receive {
            hook(message);
        }
    }

    pub fn sent(&self, message: &Value) {
        if let Some(hook) = &self.on_send {
            hook(message);
        }
    }
}

/// Request router shared by every message task
pub struct Dispatcher {
    config: Config,
    registry: Arc<ToolRegistry>,
    initializer: Option<InitCallback>,
    hooks: ServerHooks,
    pending: Mutex<Vec<JsonRpcNotification>>,
    initialized: AtomicBool,
}

impl Dispatcher {
    /// Create a dispatcher over a registry
    pub fn new(config: Config, registry: ToolRegistry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            initializer: None,
            hooks: ServerHooks::default(),
            pending: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Set the callback run asynchronously after the handshake
    pub fn with_initializer<F, Fut>(mut self, initializer: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.initializer = Some(Arc::new(
            move |params: Option<Value>| -> BoxFuture<anyhow::Result<()>> {
                Box::pin(initializer(params))
            },
        ));
        self
    }

    /// Install observability hooks
    pub fn with_hooks(mut self, hooks: ServerHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn hooks(&self) -> &ServerHooks {
        &self.hooks
    }

    /// Whether the client has confirmed the handshake
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Queue a notification for delivery once initialization completes
    pub fn enqueue_notification(&self, notification: JsonRpcNotification) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }

    fn take_pending(&self) -> Vec<JsonRpcNotification> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Handle a request, always producing a response
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone();
        let method = request.method.clone();

        match self.route(request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => {
                match &err {
                    ProtocolError::Internal { .. } => {
                        warn!(id = %id, method = %method, error = %err, "request failed")
                    }
                    _ => debug!(id = %id, method = %method, error = %err, "request rejected"),
                }
                JsonRpcResponse::error(Some(id), err.into())
            }
        }
    }

    async fn route(&self, request: JsonRpcRequest) -> Result<Value, ProtocolError> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Err(ProtocolError::InvalidRequest {
                message: format!("unsupported jsonrpc version '{}'", request.jsonrpc),
            });
        }

        match request.method.as_str() {
            methods::PING => Ok(json!({})),
            methods::INITIALIZE => self.handle_initialize(request.params),
            methods::LIST_TOOLS => Ok(serde_json::to_value(ListToolsResult {
                tools: self.registry.list(),
            })?),
            methods::CALL_TOOL => self.handle_call_tool(request.params).await,
            methods::LIST_PROMPTS => Ok(serde_json::to_value(ListPromptsResult::default())?),
            methods::LIST_RESOURCES => Ok(serde_json::to_value(ListResourcesResult::default())?),
            other => Err(ProtocolError::MethodNotFound {
                method: other.to_string(),
            }),
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, ProtocolError> {
        let params: InitializeParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();

        match &params.client_info {
            Some(client) => info!(
                client = %client.name,
                client_version = %client.version,
                protocol_version = ?params.protocol_version,
                "initialize"
            ),
            None => info!("initialize"),
        }

        self.enqueue_notification(JsonRpcNotification::new(methods::INITIALIZED, None));

        let result = InitializeResult {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: ServerCapabilities {
                tools: ListChangedCapability {
                    list_changed: !self.registry.is_empty(),
                },
                resources: ListChangedCapability::default(),
                prompts: ListChangedCapability::default(),
            },
            server_info: ServerInfo {
                name: self.config.name.clone(),
                version: self.config.version.clone(),
            },
        };

        Ok(serde_json::to_value(result)?)
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value, ProtocolError> {
        let params: CallToolParams = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| ProtocolError::InvalidParams {
                message: format!("invalid tool call parameters: {e}"),
            })?,
            None => {
                return Err(ProtocolError::InvalidParams {
                    message: "missing tool call parameters".to_string(),
                })
            }
        };

        let tool = self
            .registry
            .lookup(&params.name)
            .ok_or_else(|| ProtocolError::MissingTool {
                name: params.name.clone(),
            })?;

        let args: Arguments = match params.arguments {
            None | Some(Value::Null) => Arguments::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(ProtocolError::InvalidParams {
                    message: format!("arguments must be an object, got {}", json_type_name(&other)),
                })
            }
        };

        debug!(tool = %params.name, "calling tool");
        let result = invoke_tool(tool, args).await?;
        Ok(serde_json::to_value(call_tool_result(&result))?)
    }

    /// Handle a notification; never produces a response
    pub fn handle_notification(&self, notification: &JsonRpcNotification) {
        match notification.method.as_str() {
            methods::INITIALIZED => {
                self.initialized.store(true, Ordering::SeqCst);
                info!("client initialized");
            }
            methods::CANCELLED => {
                debug!(params = ?notification.params, "cancellation requested; in-flight calls are not interruptible")
            }
            other => debug!(method = %other, "ignoring notification"),
        }
    }

    /// Run the initialization callback and return the notifications to send.
    /// On callback failure the queued notifications are dropped.
    pub async fn run_initialization(&self, params: Option<Value>) -> Vec<JsonRpcNotification> {
        if let Some(initializer) = &self.initializer {
            if let Err(e) = initializer(params).await {
                let dropped = self.take_pending().len();
                let message = format!("{e:#}");
                warn!(error = %message, dropped, "initialization failed");
                return Vec::new();
            }
            debug!("initialization complete");
        }
        self.take_pending()
    }
}

/// Translate a tool outcome into the `tools/call` payload
pub fn call_tool_result(result: &InvocationResult) -> CallToolResult {
    match result {
        InvocationResult::Success(values) => CallToolResult {
            content: values.iter().map(ToolResultContent::from_value).collect(),
            is_error: false,
        },
        InvocationResult::Failure(errors) => CallToolResult {
            content: errors
                .iter()
                .map(|e| ToolResultContent::Text { text: e.to_text() })
                .collect(),
            is_error: true,
        },
    }
}
