//! MCP (Model Context Protocol) module
//!
//! JSON-RPC envelopes, method dispatch and the stdio server loop.

pub mod dispatcher;
pub mod server;
pub mod types;

pub use dispatcher::{Dispatcher, InitCallback, MessageHook, ServerHooks};
pub use server::{McpServer, OutputSink};
