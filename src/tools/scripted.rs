// src/tools/scripted.rs

use std::sync::atomic::{AtomicU32, Ordering};

use crate::context::RuntimeContext;
use crate::error::DomainActionError;
use crate::tools::{Tool, ToolInput, ToolResult, ToolSpec};

/// Deterministic stand-in for any action.
///
/// Returns a fixed result, optionally after failing a set number of times.
/// Used to swap a randomized stub (or a real backend) for something
/// predictable.
#[derive(Debug)]
pub struct ScriptedTool {
    spec: ToolSpec,
    result: ToolResult,
    failures: u32,
    retryable: bool,
    calls: AtomicU32,
}

impl ScriptedTool {
    /// Succeeds with `status = success` and every declared output field set
    /// to `"<field>-fixed"`.
    pub fn new(spec: ToolSpec) -> Self {
        let result = spec
            .output_fields
            .iter()
            .fold(ToolResult::success(), |result, field| {
                result.with(field, format!("{field}-fixed"))
            });
        Self {
            spec,
            result,
            failures: 0,
            retryable: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn returning(mut self, result: ToolResult) -> Self {
        self.result = result;
        self
    }

    /// Fails every call.
    pub fn failing(self, retryable: bool) -> Self {
        self.failing_times(u32::MAX, retryable)
    }

    /// Fails the first `times` calls, then succeeds.
    pub fn failing_times(mut self, times: u32, retryable: bool) -> Self {
        self.failures = times;
        self.retryable = retryable;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Tool for ScriptedTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn description(&self) -> &str {
        &self.spec.description
    }

    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    fn execute(&self, ctx: &RuntimeContext, _input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        if ctx.is_cancelled() {
            return Err(DomainActionError::cancelled(self.name()));
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            let message = format!("scripted failure #{}", call + 1);
            return Err(DomainActionError {
                action: self.spec.name.clone(),
                message,
                retryable: self.retryable,
            });
        }
        Ok(self.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec() -> ToolSpec {
        ToolSpec::new("lookup", "Scripted lookup")
            .input("order_id", "string", "Order", true)
            .outputs(&["token"])
    }

    #[test]
    fn default_result_fills_declared_fields() {
        let tool = ScriptedTool::new(spec());
        let result = tool.execute(&RuntimeContext::new("c"), &ToolInput::new()).unwrap();
        assert_eq!(result.status(), "success");
        assert_eq!(result.get("token"), Some(&json!("token-fixed")));
    }

    #[test]
    fn fails_then_recovers() {
        let tool = ScriptedTool::new(spec()).failing_times(2, true);
        let ctx = RuntimeContext::new("c");
        assert!(tool.execute(&ctx, &ToolInput::new()).unwrap_err().retryable);
        assert!(tool.execute(&ctx, &ToolInput::new()).is_err());
        assert!(tool.execute(&ctx, &ToolInput::new()).is_ok());
        assert_eq!(tool.calls(), 3);
    }
}
