// src/tools/mod.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::context::RuntimeContext;
use crate::error::{ConfigurationError, DomainActionError};

pub mod dispute;
pub mod logistics;
pub mod merchant;
pub mod notification;
pub mod recipient;
pub mod registry;
pub mod scripted;
pub mod simulate;

pub use registry::ToolRegistry;
pub use scripted::ScriptedTool;
pub use simulate::Simulation;

/// Named-parameter input of a tool call.
pub type ToolInput = Map<String, Value>;

/// The result of executing a tool: named fields, always including `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolResult {
    fields: Map<String, Value>,
}

impl ToolResult {
    pub fn new(status: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("status".into(), Value::String(status.into()));
        Self { fields }
    }

    pub fn success() -> Self {
        Self::new("success")
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn status(&self) -> &str {
        self.fields
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// Declared contract of a tool: what it takes and what it gives back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON-schema object describing the named inputs.
    pub input_schema: Value,
    /// Fields guaranteed to be present in a successful result (besides `status`).
    pub output_fields: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: json!({ "type": "object", "properties": {}, "required": [] }),
            output_fields: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Adds an input property. `kind` is a JSON-schema type name.
    pub fn input(mut self, name: &str, kind: &str, description: &str, required: bool) -> Self {
        self.input_schema["properties"][name] = json!({ "type": kind, "description": description });
        if required {
            if let Some(list) = self.input_schema["required"].as_array_mut() {
                list.push(Value::String(name.into()));
            }
        }
        self
    }

    pub fn outputs(mut self, fields: &[&str]) -> Self {
        self.output_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn declares_input(&self, name: &str) -> bool {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .is_some_and(|props| props.contains_key(name))
    }

    pub fn required_inputs(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// `status` is always produced; everything else must be declared.
    pub fn produces(&self, field: &str) -> bool {
        field == "status" || self.output_fields.iter().any(|f| f == field)
    }
}

/// Trait that defines a pluggable domain action.
///
/// Implementations stand in for backend services, so they must be safe to
/// call from several resolutions at once and must honour the context's
/// cancellation and deadline.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn spec(&self) -> ToolSpec;
    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError>;
}

pub(crate) fn require_str<'a>(
    action: &str,
    input: &'a ToolInput,
    field: &str,
) -> Result<&'a str, DomainActionError> {
    input
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| DomainActionError::invalid_input(action, field, "a non-empty string"))
}

pub(crate) fn require_value<'a>(
    action: &str,
    input: &'a ToolInput,
    field: &str,
) -> Result<&'a Value, DomainActionError> {
    input
        .get(field)
        .filter(|v| !v.is_null())
        .ok_or_else(|| DomainActionError::invalid_input(action, field, "present"))
}

pub(crate) fn optional_str<'a>(input: &'a ToolInput, field: &str) -> Option<&'a str> {
    input.get(field).and_then(Value::as_str)
}

/// Renders a value for narration: strings bare, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Registry holding the full simulated action catalogue.
pub fn standard_catalogue(sim: &Simulation) -> Result<ToolRegistry, ConfigurationError> {
    let mut registry = ToolRegistry::new();
    merchant::register(&mut registry, sim)?;
    logistics::register(&mut registry, sim)?;
    dispute::register(&mut registry, sim)?;
    recipient::register(&mut registry, sim)?;
    notification::register(&mut registry, sim)?;
    Ok(registry)
}
