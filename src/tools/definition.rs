//! Tool and parameter descriptors
//!
//! A tool is declared once at startup through [`ToolDefinition::builder`] and
//! is immutable afterwards.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::RegistryError;

/// Argument map handed to a tool handler
pub type Arguments = Map<String, Value>;

/// Function executed to produce a tool's results from validated arguments
pub type Handler = Arc<dyn Fn(&ToolArgs) -> anyhow::Result<Vec<Value>> + Send + Sync>;

/// Validated arguments as seen by a handler
///
/// Holds the caller's arguments untouched next to the tool's declared
/// defaults. [`ToolArgs::get`] falls back to the default; [`ToolArgs::provided`]
/// does not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    provided: Arguments,
    defaults: Arguments,
}

impl ToolArgs {
    pub fn new(provided: Arguments, defaults: Arguments) -> Self {
        Self { provided, defaults }
    }

    /// Argument value, or the declared default when the caller omitted it
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.provided.get(name).or_else(|| self.defaults.get(name))
    }

    /// Argument value exactly as sent by the caller
    pub fn provided(&self, name: &str) -> Option<&Value> {
        self.provided.get(name)
    }

    /// The caller's argument map
    pub fn arguments(&self) -> &Arguments {
        &self.provided
    }

    pub fn get_f64(&self, name: &str) -> anyhow::Result<f64> {
        self.get(name)
            .and_then(Value::as_f64)
            .with_context(|| format!("argument '{name}' is not a number"))
    }

    pub fn get_u64(&self, name: &str) -> anyhow::Result<u64> {
        self.get(name)
            .and_then(Value::as_u64)
            .with_context(|| format!("argument '{name}' is not a non-negative integer"))
    }

    pub fn get_str(&self, name: &str) -> anyhow::Result<&str> {
        self.get(name)
            .and_then(Value::as_str)
            .with_context(|| format!("argument '{name}' is not a string"))
    }
}

/// Declared type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    /// Free-form, possibly multi-line string
    Text,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Text => "text",
        }
    }

    /// Whether a JSON value satisfies this declared type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::Number => value.is_number(),
            ParamType::String | ParamType::Text => value.is_string(),
        }
    }

    /// JSON-Schema fragment describing this type
    fn schema(&self) -> Value {
        match self {
            ParamType::String => json!({"type": "string"}),
            ParamType::Number => json!({"type": "number"}),
            ParamType::Text => json!({"type": "string", "format": "text"}),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of the JSON type of a value, as reported in type-error records
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single typed argument of a tool
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    doc: String,
    param_type: ParamType,
    required: bool,
    default: Option<Value>,
}

impl Parameter {
    /// A parameter the caller must always supply
    pub fn required(name: impl Into<String>, param_type: ParamType, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
            param_type,
            required: true,
            default: None,
        }
    }

    /// An optional parameter with no advertised default
    pub fn optional(name: impl Into<String>, param_type: ParamType, doc: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, doc)
        }
    }

    /// An optional parameter whose default is advertised in the input schema
    pub fn with_default(
        name: impl Into<String>,
        param_type: ParamType,
        doc: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        Self {
            required: false,
            default: Some(default.into()),
            ..Self::required(name, param_type, doc)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn param_type(&self) -> ParamType {
        self.param_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    fn schema(&self) -> Value {
        let mut schema = self.param_type.schema();
        schema["doc"] = json!(self.doc);
        schema["description"] = json!(self.doc);
        schema["required"] = json!(self.required);
        if let Some(default) = &self.default {
            schema["default"] = default.clone();
        }
        schema
    }
}

/// Static description of a callable tool
#[derive(Clone)]
pub struct ToolDefinition {
    name: String,
    doc: String,
    parameters: Vec<Parameter>,
    handler: Handler,
}

impl ToolDefinition {
    /// Start declaring a tool
    pub fn builder(name: impl Into<String>, doc: impl Into<String>) -> ToolBuilder {
        ToolBuilder {
            name: name.into(),
            doc: doc.into(),
            parameters: Vec::new(),
            handler: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn handler(&self) -> Handler {
        Arc::clone(&self.handler)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Names of all required parameters, in declaration order
    pub fn required_names(&self) -> Vec<String> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Pair the caller's arguments with this tool's declared defaults
    pub fn arguments(&self, provided: Arguments) -> ToolArgs {
        let defaults = self
            .parameters
            .iter()
            .filter_map(|p| Some((p.name.clone(), p.default.clone()?)))
            .collect();
        ToolArgs::new(provided, defaults)
    }

    /// JSON-Schema-like description of the accepted arguments
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.schema()))
            .collect();

        json!({
            "type": "object",
            "required": self.required_names(),
            "properties": properties,
        })
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("doc", &self.doc)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ToolDefinition`]
pub struct ToolBuilder {
    name: String,
    doc: String,
    parameters: Vec<Parameter>,
    handler: Option<Handler>,
}

impl ToolBuilder {
    /// Append a parameter; declaration order is preserved
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Set the function that executes the tool
    pub fn handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ToolArgs) -> anyhow::Result<Vec<Value>> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Validate the declaration and produce the immutable definition
    pub fn build(self) -> Result<ToolDefinition, RegistryError> {
        if !is_identifier(&self.name) {
            return Err(RegistryError::InvalidName { name: self.name });
        }

        for (i, p) in self.parameters.iter().enumerate() {
            if !is_identifier(&p.name) {
                return Err(RegistryError::InvalidName {
                    name: p.name.clone(),
                });
            }
            if self.parameters[..i].iter().any(|q| q.name == p.name) {
                return Err(RegistryError::DuplicateParameter {
                    tool: self.name.clone(),
                    parameter: p.name.clone(),
                });
            }
            if let Some(default) = &p.default {
                if !p.param_type.accepts(default) {
                    return Err(RegistryError::InvalidDefault {
                        tool: self.name.clone(),
                        parameter: p.name.clone(),
                        expected: p.param_type.to_string(),
                    });
                }
            }
        }

        let handler = self
            .handler
            .ok_or_else(|| RegistryError::MissingHandler {
                name: self.name.clone(),
            })?;

        Ok(ToolDefinition {
            name: self.name,
            doc: self.doc,
            parameters: self.parameters,
            handler,
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
