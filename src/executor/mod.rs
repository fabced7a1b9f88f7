// src/executor/mod.rs

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::context::RuntimeContext;
use crate::error::{ExecutionFailure, PlanExecutionError};
use crate::memory::Memory;
use crate::model::Scenario;
use crate::protocol::summary;
use crate::protocol::{ExecutionTrace, InputSource, Plan, PlanStep, TraceEntry, render_template};
use crate::tools::{ToolInput, ToolRegistry, display_value};

const BACKOFF_SLICE: Duration = Duration::from_millis(10);

/// What a completed plan produced.
#[derive(Debug, Clone, Serialize)]
pub struct PlanOutcome {
    pub summary: String,
    pub trace: ExecutionTrace,
}

/// Runs plans step by step against a shared registry.
#[derive(Debug, Clone)]
pub struct PlanExecutor {
    registry: Arc<ToolRegistry>,
    retry: RetryConfig,
    step_timeout: Duration,
}

impl PlanExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            retry: RetryConfig::default(),
            step_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Executes `plan` in declared order. On failure the error carries every
    /// step that completed before it.
    pub fn execute(
        &self,
        plan: &Plan,
        scenario: &Scenario,
        ctx: &RuntimeContext,
        session: &dyn Memory,
    ) -> Result<PlanOutcome, PlanExecutionError> {
        let mut trace = ExecutionTrace::new();
        info!(plan = %plan.name, steps = plan.steps.len(), "executing plan");

        for step in &plan.steps {
            match self.run_step(step, scenario, ctx, session, &trace) {
                Ok(entry) => {
                    export(step, &entry, session);
                    trace.push(entry);
                }
                Err(cause) => {
                    warn!(plan = %plan.name, step = %step.id, action = %step.action, error = %cause, "plan aborted");
                    return Err(PlanExecutionError {
                        plan: plan.name.clone(),
                        step: Some(step.id.clone()),
                        cause,
                        trace,
                    });
                }
            }
        }

        let summary = summary::render(plan.summary, scenario, &trace);
        info!(plan = %plan.name, steps = trace.len(), "plan completed");
        Ok(PlanOutcome { summary, trace })
    }

    fn run_step(
        &self,
        step: &PlanStep,
        scenario: &Scenario,
        ctx: &RuntimeContext,
        session: &dyn Memory,
        trace: &ExecutionTrace,
    ) -> Result<TraceEntry, ExecutionFailure> {
        checkpoint(ctx)?;
        let tool = self.registry.lookup(&step.action)?;
        let inputs = resolve_inputs(step, scenario, session, trace)?;
        debug!(step = %step.id, inputs = %serde_json::Value::Object(inputs.clone()), "inputs resolved");

        let started_at = Utc::now();
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            info!(step = %step.id, action = %step.action, attempt, "running step");
            let step_ctx = ctx.for_step(self.step_timeout, attempt);
            match tool.invoke(&step_ctx, &inputs) {
                Ok(result) => {
                    debug!(step = %step.id, status = result.status(), "step succeeded");
                    return Ok(TraceEntry {
                        step: step.id.clone(),
                        action: step.action.clone(),
                        resolved_inputs: inputs,
                        result,
                        attempts: attempt + 1,
                        started_at,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });
                }
                Err(err) => {
                    checkpoint(ctx)?;
                    if !err.retryable || attempt >= self.retry.max_retries {
                        return Err(err.into());
                    }
                    attempt += 1;
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(step = %step.id, action = %step.action, attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying step");
                    backoff(ctx, delay)?;
                }
            }
        }
    }
}

/// Stops the run if the caller cancelled or the resolution deadline passed.
fn checkpoint(ctx: &RuntimeContext) -> Result<(), ExecutionFailure> {
    if ctx.is_cancelled() {
        Err(ExecutionFailure::Cancelled)
    } else if ctx.is_expired() {
        Err(ExecutionFailure::DeadlineExceeded)
    } else {
        Ok(())
    }
}

fn backoff(ctx: &RuntimeContext, delay: Duration) -> Result<(), ExecutionFailure> {
    let until = Instant::now() + delay;
    loop {
        checkpoint(ctx)?;
        let now = Instant::now();
        if now >= until {
            return Ok(());
        }
        thread::sleep((until - now).min(BACKOFF_SLICE));
    }
}

fn export(step: &PlanStep, entry: &TraceEntry, session: &dyn Memory) {
    for field in &step.exports {
        match entry.result.get(field) {
            Some(value) => session.put(field, value.clone()),
            None => warn!(step = %step.id, field = %field, "exported field missing from result"),
        }
    }
}

fn resolve_inputs(
    step: &PlanStep,
    scenario: &Scenario,
    session: &dyn Memory,
    trace: &ExecutionTrace,
) -> Result<ToolInput, ExecutionFailure> {
    step.inputs
        .iter()
        .map(|(name, source)| {
            resolve(source, scenario, session, trace)
                .map(|value| (name.clone(), value))
                .map_err(|reason| ExecutionFailure::UnresolvedInput {
                    step: step.id.clone(),
                    input: name.clone(),
                    reason,
                })
        })
        .collect()
}

fn resolve(
    source: &InputSource,
    scenario: &Scenario,
    session: &dyn Memory,
    trace: &ExecutionTrace,
) -> Result<Value, String> {
    match source {
        InputSource::Literal(value) => Ok(value.clone()),
        InputSource::Scenario(field) => scenario
            .field(field)
            .map(Value::from)
            .ok_or_else(|| format!("scenario has no field '{field}'")),
        InputSource::Context(key) => session
            .get(key)
            .ok_or_else(|| format!("context key '{key}' is not set")),
        InputSource::Step { step, field } => {
            let entry = trace
                .step(step)
                .ok_or_else(|| format!("step '{step}' has not run"))?;
            entry
                .result
                .get(field)
                .cloned()
                .ok_or_else(|| format!("step '{step}' returned no '{field}'"))
        }
        InputSource::Template(text) => render_template(text, |namespace, name| {
            let inner = match namespace {
                "scenario" => InputSource::Scenario(name.to_string()),
                "context" => InputSource::Context(name.to_string()),
                step => InputSource::Step {
                    step: step.to_string(),
                    field: name.to_string(),
                },
            };
            resolve(&inner, scenario, session, trace).map(|v| display_value(&v))
        })
        .map(Value::String),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioDefaults;
    use crate::memory::ContextStore;
    use crate::model::ScenarioCategory;
    use crate::protocol::SummaryTemplate;
    use crate::tools::{ScriptedTool, ToolResult, ToolSpec};
    use serde_json::json;

    fn spec(name: &str, inputs: &[&str], outputs: &[&str]) -> ToolSpec {
        inputs
            .iter()
            .fold(ToolSpec::new(name, "scripted"), |spec, input| {
                spec.input(input, "any", input, true)
            })
            .outputs(outputs)
    }

    fn scenario() -> Scenario {
        Scenario::from_text(
            "case-1",
            "driver-9 spilled order-1",
            ScenarioCategory::Dispute,
            &ScenarioDefaults::default(),
        )
    }

    fn executor(tools: Vec<Arc<ScriptedTool>>, retry: RetryConfig) -> PlanExecutor {
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register_arc(tool).unwrap();
        }
        PlanExecutor::new(Arc::new(registry)).with_retry(retry)
    }

    fn quick_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            backoff_ms: 1,
            max_backoff_ms: 5,
        }
    }

    #[test]
    fn wires_scenario_step_and_context_values() {
        let open = Arc::new(
            ScriptedTool::new(spec("open", &["order_id"], &["ticket"]))
                .returning(ToolResult::success().with("ticket", "T-1")),
        );
        let close = Arc::new(ScriptedTool::new(spec("close", &["ticket", "note"], &["closed"])));
        let executor = executor(vec![open, close], RetryConfig::no_retry());
        let plan = Plan::new("demo", SummaryTemplate::Generic)
            .step(
                PlanStep::new("a", "open")
                    .scenario("order_id", "order_id")
                    .export("ticket"),
            )
            .step(
                PlanStep::new("b", "close")
                    .context("ticket", "ticket")
                    .template("note", "{scenario.order_id} closed as {a.ticket}"),
            );
        let store = ContextStore::new();
        let session = store.open_session("case-1").unwrap();

        let outcome = executor
            .execute(&plan, &scenario(), &RuntimeContext::new("case-1"), &session)
            .unwrap();

        let second = outcome.trace.step("b").unwrap();
        assert_eq!(second.resolved_inputs["ticket"], json!("T-1"));
        assert_eq!(second.resolved_inputs["note"], json!("order-1 closed as T-1"));
        assert_eq!(session.get("ticket"), Some(json!("T-1")));
        assert_eq!(outcome.summary, "Executed 2 actions: open (success), close (success).");
    }

    #[test]
    fn debug_logging_records_resolved_inputs() {
        let open = Arc::new(ScriptedTool::new(spec("open", &["order_id"], &[])));
        let executor = executor(vec![open], RetryConfig::no_retry());
        let plan = Plan::new("logged", SummaryTemplate::Generic)
            .step(PlanStep::new("a", "open").scenario("order_id", "order_id"));
        let store = ContextStore::new();
        let session = store.open_session("c").unwrap();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();

        let outcome = tracing::subscriber::with_default(subscriber, || {
            executor.execute(&plan, &scenario(), &RuntimeContext::new("c"), &session)
        })
        .unwrap();
        assert_eq!(outcome.trace.step("a").unwrap().resolved_inputs["order_id"], json!("order-1"));
    }

    #[test]
    fn retryable_failure_recovers_within_budget() {
        let flaky = Arc::new(ScriptedTool::new(spec("flaky", &[], &["x"])).failing_times(2, true));
        let executor = executor(vec![flaky.clone()], quick_retry());
        let plan = Plan::new("retry", SummaryTemplate::Generic).step(PlanStep::new("a", "flaky"));
        let store = ContextStore::new();
        let session = store.open_session("c").unwrap();

        let outcome = executor
            .execute(&plan, &scenario(), &RuntimeContext::new("c"), &session)
            .unwrap();
        assert_eq!(outcome.trace.step("a").unwrap().attempts, 3);
        assert_eq!(flaky.calls(), 3);
    }

    #[test]
    fn retry_budget_exhaustion_aborts() {
        let down = Arc::new(ScriptedTool::new(spec("down", &[], &[])).failing(true));
        let executor = executor(vec![down.clone()], quick_retry());
        let plan = Plan::new("retry", SummaryTemplate::Generic).step(PlanStep::new("a", "down"));
        let store = ContextStore::new();
        let session = store.open_session("c").unwrap();

        let err = executor
            .execute(&plan, &scenario(), &RuntimeContext::new("c"), &session)
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.step.as_deref(), Some("a"));
        assert_eq!(down.calls(), 3);
    }

    #[test]
    fn fatal_failure_is_not_retried() {
        let broken = Arc::new(ScriptedTool::new(spec("broken", &[], &[])).failing(false));
        let executor = executor(vec![broken.clone()], quick_retry());
        let plan = Plan::new("fatal", SummaryTemplate::Generic).step(PlanStep::new("a", "broken"));
        let store = ContextStore::new();
        let session = store.open_session("c").unwrap();

        let err = executor
            .execute(&plan, &scenario(), &RuntimeContext::new("c"), &session)
            .unwrap_err();
        assert!(matches!(err.cause, ExecutionFailure::Action(ref e) if !e.retryable));
        assert_eq!(broken.calls(), 1);
    }

    #[test]
    fn cancelled_context_runs_nothing() {
        let tool = Arc::new(ScriptedTool::new(spec("noop", &[], &[])));
        let executor = executor(vec![tool.clone()], RetryConfig::no_retry());
        let plan = Plan::new("cancel", SummaryTemplate::Generic).step(PlanStep::new("a", "noop"));
        let store = ContextStore::new();
        let session = store.open_session("c").unwrap();
        let ctx = RuntimeContext::new("c");
        ctx.cancel();

        let err = executor.execute(&plan, &scenario(), &ctx, &session).unwrap_err();
        assert!(matches!(err.cause, ExecutionFailure::Cancelled));
        assert!(err.trace.is_empty());
        assert_eq!(tool.calls(), 0);
    }

    #[test]
    fn expired_deadline_aborts() {
        let tool = Arc::new(ScriptedTool::new(spec("noop", &[], &[])));
        let executor = executor(vec![tool], RetryConfig::no_retry());
        let plan = Plan::new("late", SummaryTemplate::Generic).step(PlanStep::new("a", "noop"));
        let store = ContextStore::new();
        let session = store.open_session("c").unwrap();
        let ctx = RuntimeContext::new("c").with_timeout(Duration::ZERO);

        let err = executor.execute(&plan, &scenario(), &ctx, &session).unwrap_err();
        assert!(matches!(err.cause, ExecutionFailure::DeadlineExceeded));
    }

    #[test]
    fn unknown_action_and_missing_context_abort() {
        let executor = executor(vec![], RetryConfig::no_retry());
        let store = ContextStore::new();
        let session = store.open_session("c").unwrap();

        let plan = Plan::new("ghost", SummaryTemplate::Generic).step(PlanStep::new("a", "ghost"));
        let err = executor
            .execute(&plan, &scenario(), &RuntimeContext::new("c"), &session)
            .unwrap_err();
        assert!(matches!(err.cause, ExecutionFailure::UnknownAction(ref e) if e.name == "ghost"));

        let tool = Arc::new(ScriptedTool::new(spec("needs", &["ref"], &[])));
        let executor = self::executor(vec![tool], RetryConfig::no_retry());
        let plan = Plan::new("ctx", SummaryTemplate::Generic)
            .step(PlanStep::new("a", "needs").context("ref", "never_set"));
        let err = executor
            .execute(&plan, &scenario(), &RuntimeContext::new("c"), &session)
            .unwrap_err();
        assert!(matches!(err.cause, ExecutionFailure::UnresolvedInput { ref input, .. } if input == "ref"));
    }
}
