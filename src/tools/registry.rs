//! Tool registry
//!
//! Built once at startup and read-only afterwards. Shared across message
//! tasks behind an `Arc`.

use std::collections::BTreeMap;

use crate::error::RegistryError;
use crate::mcp::types::Tool;
use crate::tools::definition::ToolDefinition;

/// Immutable mapping from tool name to definition
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Start building a registry
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Build a registry from a list of tools, rejecting name collisions
    pub fn from_tools(tools: impl IntoIterator<Item = ToolDefinition>) -> Result<Self, RegistryError> {
        tools
            .into_iter()
            .try_fold(Self::builder(), ToolRegistryBuilder::register)
            .map(ToolRegistryBuilder::build)
    }

    /// Resolve a tool by name
    pub fn lookup(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Describe every tool for `tools/list`, ordered by name
    pub fn list(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|t| Tool {
                name: t.name().to_string(),
                description: Some(t.doc().to_string()),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// One-time registration step for [`ToolRegistry`]
#[derive(Debug, Default)]
pub struct ToolRegistryBuilder {
    tools: BTreeMap<String, ToolDefinition>,
}

impl ToolRegistryBuilder {
    /// Register a tool; a second tool with the same name is an error
    pub fn register(mut self, tool: ToolDefinition) -> Result<Self, RegistryError> {
        if self.tools.contains_key(tool.name()) {
            return Err(RegistryError::DuplicateTool {
                name: tool.name().to_string(),
            });
        }
        self.tools.insert(tool.name().to_string(), tool);
        Ok(self)
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry { tools: self.tools }
    }
}
