//! Error types for the toolwire server
//!
//! This module defines the error hierarchy for all operations in the server.
//! Protocol errors map onto JSON-RPC error responses; tool-level failures are
//! not errors at this layer and live in [`crate::tools::InvocationResult`].

use serde_json::{json, Value};
use thiserror::Error;

use crate::mcp::types::{error_codes, JsonRpcError};

/// Main error type for the toolwire server
#[derive(Error, Debug)]
pub enum ToolwireError {
    /// Tool or registry construction errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// JSON-RPC protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Stdio transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while declaring tools or building the registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool already registered: {name}")]
    DuplicateTool { name: String },

    #[error("Duplicate parameter '{parameter}' in tool '{tool}'")]
    DuplicateParameter { tool: String, parameter: String },

    #[error("Invalid identifier: '{name}'")]
    InvalidName { name: String },

    #[error("Default for parameter '{parameter}' in tool '{tool}' is not a {expected}")]
    InvalidDefault {
        tool: String,
        parameter: String,
        expected: String,
    },

    #[error("Tool '{name}' has no handler")]
    MissingHandler { name: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(err: validator::ValidationErrors) -> Self {
        ConfigError::Invalid {
            message: err.to_string(),
        }
    }
}

/// Protocol-level failures, each answered with a JSON-RPC error response
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Missing required parameters: {}", missing.join(", "))]
    MissingParameters {
        provided: Vec<String>,
        required: Vec<String>,
        missing: Vec<String>,
    },

    #[error("Tool not found: {name}")]
    MissingTool { name: String },

    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ProtocolError {
    /// Create an internal error from anything displayable
    pub fn internal(message: impl std::fmt::Display) -> Self {
        ProtocolError::Internal {
            message: message.to_string(),
        }
    }

    /// Standard JSON-RPC error code for this failure
    pub fn code(&self) -> i32 {
        match self {
            ProtocolError::ParseError { .. } => error_codes::PARSE_ERROR,
            ProtocolError::InvalidRequest { .. } => error_codes::INVALID_REQUEST,
            ProtocolError::MethodNotFound { .. } => error_codes::METHOD_NOT_FOUND,
            ProtocolError::MissingParameters { .. }
            | ProtocolError::MissingTool { .. }
            | ProtocolError::InvalidParams { .. } => error_codes::INVALID_PARAMS,
            ProtocolError::Internal { .. } => error_codes::INTERNAL_ERROR,
        }
    }

    /// Structured diagnostics attached to the error response
    pub fn data(&self) -> Option<Value> {
        match self {
            ProtocolError::MissingParameters {
                provided,
                required,
                missing,
            } => Some(json!({
                "cause": "missing-parameters",
                "provided-args": provided,
                "required-args": required,
                "missing-args": missing,
            })),
            ProtocolError::MissingTool { name } => Some(json!({
                "cause": "missing-tool",
                "name": name,
            })),
            ProtocolError::MethodNotFound { method } => Some(json!({ "method": method })),
            _ => None,
        }
    }
}

impl From<ProtocolError> for JsonRpcError {
    fn from(err: ProtocolError) -> Self {
        JsonRpcError {
            code: err.code(),
            message: err.to_string(),
            data: err.data(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::internal(err)
    }
}

/// A failure raised by a tool handler, tagged so callers can tell it apart
/// from framework failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerFailure {
    pub message: String,
}

impl HandlerFailure {
    /// Cause tag carried by every handler failure
    pub const CAUSE: &'static str = "handler-exception";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn cause(&self) -> &'static str {
        Self::CAUSE
    }
}

/// Stdio transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to write output: {message}")]
    Write { message: String },

    #[error("Giving up after {count} consecutive read failures")]
    TooManyReadFailures { count: usize },
}

/// Best-effort message from a panic payload
pub(crate) fn describe_panic(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Result type alias for toolwire operations
pub type Result<T> = std::result::Result<T, ToolwireError>;
