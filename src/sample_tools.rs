//! Sample tools served by the `toolwire-server` binary

use anyhow::bail;
use serde_json::json;

use crate::error::RegistryError;
use crate::tools::{ParamType, Parameter, ToolDefinition, ToolRegistry};

const MAX_REPEAT: u64 = 100;

/// Registry containing every sample tool
pub fn registry() -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::from_tools([add()?, echo()?, word_count()?, fail()?])
}

/// Sum of two numbers
pub fn add() -> Result<ToolDefinition, RegistryError> {
    ToolDefinition::builder("add", "Add two numbers and return the sum")
        .param(Parameter::required("a", ParamType::Number, "First addend"))
        .param(Parameter::required("b", ParamType::Number, "Second addend"))
        .handler(|args| {
            let a = args.get_f64("a")?;
            let b = args.get_f64("b")?;
            Ok(vec![json!(a + b)])
        })
        .build()
}

/// Repeat a message
pub fn echo() -> Result<ToolDefinition, RegistryError> {
    ToolDefinition::builder("echo", "Return the message, optionally repeated")
        .param(Parameter::required("message", ParamType::String, "Message to echo"))
        .param(Parameter::with_default(
            "repeat",
            ParamType::Number,
            "Number of copies to return",
            1,
        ))
        .handler(|args| {
            let message = args.get_str("message")?;
            let repeat = args.get_u64("repeat")?;
            if repeat > MAX_REPEAT {
                bail!("repeat must be at most {MAX_REPEAT}, got {repeat}");
            }
            Ok((0..repeat).map(|_| json!(message)).collect())
        })
        .build()
}

/// Count words and lines in a block of text
pub fn word_count() -> Result<ToolDefinition, RegistryError> {
    ToolDefinition::builder("word_count", "Count the words and lines in a block of text")
        .param(Parameter::required("text", ParamType::Text, "Text to analyse"))
        .handler(|args| {
            let text = args.get_str("text")?;
            Ok(vec![json!({
                "words": text.split_whitespace().count(),
                "lines": text.lines().count(),
            })])
        })
        .build()
}

/// Always fails; useful for exercising error reporting
pub fn fail() -> Result<ToolDefinition, RegistryError> {
    ToolDefinition::builder("fail", "Always fails with the given reason")
        .param(Parameter::with_default(
            "reason",
            ParamType::String,
            "Failure message",
            "requested failure",
        ))
        .handler(|args| bail!("{}", args.get_str("reason")?))
        .build()
}
