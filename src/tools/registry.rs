// src/tools/registry.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::RuntimeContext;
use crate::error::{DomainActionError, DuplicateActionError, UnknownActionError};
use crate::tools::{Tool, ToolInput, ToolResult, ToolSpec};

/// A tool together with the spec captured when it was registered.
#[derive(Clone)]
pub struct RegisteredTool {
    spec: ToolSpec,
    tool: Arc<dyn Tool>,
}

impl RegisteredTool {
    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    pub fn invoke(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        self.tool.execute(ctx, input)
    }
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.spec.name)
            .finish()
    }
}

/// Catalogue of domain actions, keyed by unique name.
///
/// Populated at startup, then shared read-only (`Arc<ToolRegistry>`) between
/// any number of concurrent resolutions.
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), DuplicateActionError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), DuplicateActionError> {
        let spec = tool.spec();
        if self.tools.contains_key(&spec.name) {
            return Err(DuplicateActionError { name: spec.name });
        }
        self.order.push(spec.name.clone());
        self.tools.insert(spec.name.clone(), RegisteredTool { spec, tool });
        Ok(())
    }

    pub fn with_tool<T: Tool + 'static>(mut self, tool: T) -> Result<Self, DuplicateActionError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn lookup(&self, name: &str) -> Result<&RegisteredTool, UnknownActionError> {
        self.tools.get(name).ok_or_else(|| UnknownActionError {
            name: name.to_string(),
        })
    }

    pub fn spec(&self, name: &str) -> Result<&ToolSpec, UnknownActionError> {
        self.lookup(name).map(RegisteredTool::spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Every spec, in registration order.
    pub fn catalogue(&self) -> Vec<&ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(RegisteredTool::spec)
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
