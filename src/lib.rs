//! toolwire
//!
//! A framework for exposing named, typed tools over a line-delimited
//! JSON-RPC (Model Context Protocol) stdio transport.

pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod sample_tools;
pub mod tools;

pub use config::Config;
pub use error::{Result, ToolwireError};
pub use mcp::{Dispatcher, McpServer, OutputSink};
pub use tools::{ParamType, Parameter, ToolDefinition, ToolRegistry};
