//! Tool declaration, registry, validation and invocation

pub mod definition;
pub mod invoker;
pub mod registry;
pub mod validator;

pub use definition::{
    Arguments, Handler, ParamType, Parameter, ToolArgs, ToolBuilder, ToolDefinition,
};
pub use invoker::{invoke, invoke_tool, InvocationResult, ToolError};
pub use registry::{ToolRegistry, ToolRegistryBuilder};
pub use validator::{validate, TypeError, ValidationOutcome};
