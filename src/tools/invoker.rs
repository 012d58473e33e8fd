//! Tool invocation pipeline
//!
//! Validates arguments, runs the handler and folds every tool-level failure
//! into an [`InvocationResult`]. Only missing required arguments escape as a
//! [`ProtocolError`], since that means the caller sent a malformed request.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{describe_panic, HandlerFailure, ProtocolError};
use crate::tools::definition::{Arguments, Handler, ToolArgs, ToolDefinition};
use crate::tools::validator::{validate, TypeError, ValidationOutcome};

/// A tool-level failure reported inside a successful JSON-RPC response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolError {
    /// Argument did not match its declared type
    Type(TypeError),
    /// Handler raised; carries the failure message
    Handler(String),
}

impl ToolError {
    /// Text rendering used in `tools/call` content items
    pub fn to_text(&self) -> String {
        match self {
            ToolError::Type(e) => json!({
                "parameter": e.parameter,
                "expected": e.expected,
                "got": e.got,
            })
            .to_string(),
            ToolError::Handler(message) => message.clone(),
        }
    }
}

/// Result of running a tool
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Success(Vec<Value>),
    Failure(Vec<ToolError>),
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Success(_))
    }

    pub fn results(&self) -> Option<&[Value]> {
        match self {
            InvocationResult::Success(results) => Some(results),
            InvocationResult::Failure(_) => None,
        }
    }

    pub fn errors(&self) -> Option<&[ToolError]> {
        match self {
            InvocationResult::Success(_) => None,
            InvocationResult::Failure(errors) => Some(errors),
        }
    }
}

/// Run a handler, converting any failure (including a panic) into a
/// [`HandlerFailure`]
pub async fn invoke(handler: Handler, args: ToolArgs) -> Result<Vec<Value>, HandlerFailure> {
    let outcome = tokio::task::spawn_blocking(move || handler(&args)).await;

    let failure = match outcome {
        Ok(Ok(results)) => return Ok(results),
        Ok(Err(e)) => HandlerFailure::new(format!("{e:#}")),
        Err(e) if e.is_panic() => {
            HandlerFailure::new(format!("handler panicked: {}", describe_panic(e.into_panic())))
        }
        Err(e) => HandlerFailure::new(e.to_string()),
    };

    warn!(
        error = %failure,
        cause = failure.cause(),
        "tool handler failed"
    );
    Err(failure)
}

/// Validate `args` against `tool` and, when they pass, invoke its handler
pub async fn invoke_tool(
    tool: &ToolDefinition,
    args: Arguments,
) -> Result<InvocationResult, ProtocolError> {
    match validate(tool.parameters(), &args) {
        ValidationOutcome::Valid => {}
        ValidationOutcome::MissingParameters(missing) => {
            let mut provided: Vec<String> = args.keys().cloned().collect();
            provided.sort();
            debug!(tool = tool.name(), missing = ?missing, "missing required arguments");
            return Err(ProtocolError::MissingParameters {
                provided,
                required: tool.required_names(),
                missing,
            });
        }
        ValidationOutcome::TypeErrors(errors) => {
            debug!(tool = tool.name(), count = errors.len(), "argument type errors");
            return Ok(InvocationResult::Failure(
                errors.into_iter().map(ToolError::Type).collect(),
            ));
        }
    }

    match invoke(tool.handler(), tool.arguments(args)).await {
        Ok(results) => Ok(InvocationResult::Success(results)),
        Err(failure) => Ok(InvocationResult::Failure(vec![ToolError::Handler(
            failure.message,
        )])),
    }
}
