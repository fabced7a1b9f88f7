use std::sync::Arc;

use synapse::agent::Coordinator;
use synapse::classifier::{Classifier, KeywordClassifier};
use synapse::config::{RetryConfig, ScenarioDefaults};
use synapse::context::RuntimeContext;
use synapse::error::{ConfigurationError, ExecutionFailure, ResolutionError};
use synapse::executor::PlanExecutor;
use synapse::memory::ContextStore;
use synapse::model::{Scenario, ScenarioCategory};
use synapse::protocol::playbooks::Playbooks;
use synapse::protocol::planner::FixedPlanner;
use synapse::protocol::{Plan, PlanStep, SummaryTemplate};
use synapse::tools::{ScriptedTool, ToolRegistry, ToolResult, ToolSpec};
use synapse::validation::{PlanValidationError, validate_plan};

fn spec(name: &str, inputs: &[&str], outputs: &[&str]) -> ToolSpec {
    inputs
        .iter()
        .fold(ToolSpec::new(name, "scripted action"), |spec, input| {
            spec.input(input, "any", input, true)
        })
        .outputs(outputs)
}

fn three_step_plan() -> Plan {
    Plan::new("three_steps", SummaryTemplate::Generic)
        .step(
            PlanStep::new("s1", "lookup")
                .scenario("order_id", "order_id")
                .export("ticket"),
        )
        .step(PlanStep::new("s2", "charge").from_step("ticket", "s1", "ticket"))
        .step(PlanStep::new("s3", "notify").context("ticket", "ticket"))
}

#[test]
fn fatal_failure_on_second_step_keeps_first_in_trace() {
    let mut registry = ToolRegistry::new();
    registry
        .register(ScriptedTool::new(spec("lookup", &["order_id"], &["ticket"])))
        .unwrap();
    registry
        .register(ScriptedTool::new(spec("charge", &["ticket"], &[])).failing(false))
        .unwrap();
    let notify = Arc::new(ScriptedTool::new(spec("notify", &["ticket"], &[])));
    registry.register_arc(notify.clone()).unwrap();

    let playbooks =
        Playbooks::from_plans([(ScenarioCategory::MerchantOverloaded, three_step_plan())], &registry).unwrap();
    let coordinator = Coordinator::builder(registry)
        .planner(FixedPlanner::new(playbooks))
        .retry(RetryConfig::no_retry())
        .build()
        .unwrap();

    let err = coordinator.resolve_with("kitchen is slow", RuntimeContext::new("case-1")).unwrap_err();

    let ResolutionError::Execution(failure) = &err else {
        panic!("expected execution failure, got {err:?}");
    };
    assert_eq!(failure.step.as_deref(), Some("s2"));
    assert!(matches!(failure.cause, ExecutionFailure::Action(ref e) if e.action == "charge"));
    let trace = err.partial_trace().unwrap();
    assert_eq!(trace.len(), 1);
    assert_eq!(trace.entries()[0].step, "s1");
    assert_eq!(notify.calls(), 0);
    assert_eq!(coordinator.store().active_sessions(), 0);
}

#[test]
fn category_without_playbook_is_a_planning_error() {
    let mut registry = ToolRegistry::new();
    registry
        .register(ScriptedTool::new(spec("lookup", &["order_id"], &["ticket"])))
        .unwrap();
    let plan = Plan::new("only", SummaryTemplate::Generic)
        .step(PlanStep::new("s1", "lookup").scenario("order_id", "order_id"));
    let playbooks = Playbooks::from_plans([(ScenarioCategory::Dispute, plan)], &registry).unwrap();
    let coordinator = Coordinator::builder(registry)
        .planner(FixedPlanner::new(playbooks))
        .build()
        .unwrap();

    let err = coordinator
        .resolve_with("nothing special", RuntimeContext::new("case-2"))
        .unwrap_err();
    assert!(matches!(err, ResolutionError::Planning(_)));
}

#[test]
fn scripted_tools_make_runs_reproducible() {
    let mut registry = ToolRegistry::new();
    registry
        .register(
            ScriptedTool::new(spec("lookup", &["order_id"], &["ticket"]))
                .returning(ToolResult::success().with("ticket", "T-77")),
        )
        .unwrap();
    registry
        .register(ScriptedTool::new(spec("charge", &["ticket"], &["receipt"])))
        .unwrap();
    registry
        .register(ScriptedTool::new(spec("notify", &["ticket"], &[])))
        .unwrap();
    let executor = PlanExecutor::new(Arc::new(registry));
    let scenario = Scenario::from_text(
        "case-3",
        "order-5 is late",
        ScenarioCategory::MerchantOverloaded,
        &ScenarioDefaults::default(),
    );
    let plan = three_step_plan();
    let store = ContextStore::new();

    let run = |case: &str| {
        let session = store.open_session(case).unwrap();
        let outcome = executor
            .execute(&plan, &scenario, &RuntimeContext::new(case), &session)
            .unwrap();
        (outcome, session.close())
    };
    let (first, first_context) = run("a");
    let (second, second_context) = run("b");

    let strip = |trace: &synapse::protocol::ExecutionTrace| {
        trace
            .entries()
            .iter()
            .map(|e| (e.step.clone(), e.action.clone(), e.resolved_inputs.clone(), e.result.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(strip(&first.trace), strip(&second.trace));
    assert_eq!(first.summary, second.summary);
    assert_eq!(first_context, second_context);
    assert_eq!(first.trace.step("s3").unwrap().resolved_inputs["ticket"], "T-77");
    assert_eq!(store.active_sessions(), 0);
}

#[test]
fn invalid_playbooks_are_rejected_before_any_run() {
    let mut registry = ToolRegistry::new();
    registry
        .register(ScriptedTool::new(spec("lookup", &["order_id"], &["ticket"])))
        .unwrap();
    registry
        .register(ScriptedTool::new(spec("charge", &["ticket"], &[])))
        .unwrap();

    let forward = Plan::new("forward", SummaryTemplate::Generic)
        .step(PlanStep::new("s1", "charge").from_step("ticket", "s2", "ticket"))
        .step(PlanStep::new("s2", "lookup").scenario("order_id", "order_id"));
    let unknown_field = Plan::new("unknown_field", SummaryTemplate::Generic)
        .step(PlanStep::new("s1", "lookup").scenario("order_id", "order_id"))
        .step(PlanStep::new("s2", "charge").from_step("ticket", "s1", "receipt"));
    let missing_input = Plan::new("missing_input", SummaryTemplate::Generic).step(PlanStep::new("s1", "lookup"));
    let unknown_action = Plan::new("unknown_action", SummaryTemplate::Generic).step(PlanStep::new("s1", "refund"));

    assert!(matches!(
        validate_plan(&forward, &registry).as_slice(),
        [PlanValidationError::InvalidReference { .. }]
    ));
    assert!(matches!(
        validate_plan(&unknown_field, &registry).as_slice(),
        [PlanValidationError::UnknownField { .. }]
    ));
    assert!(matches!(
        validate_plan(&missing_input, &registry).as_slice(),
        [PlanValidationError::MissingInput { .. }]
    ));
    assert!(matches!(
        validate_plan(&unknown_action, &registry).as_slice(),
        [PlanValidationError::UnknownAction { .. }]
    ));

    let err = Playbooks::from_plans([(ScenarioCategory::Dispute, forward)], &registry).unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidPlan { ref plan, .. } if plan == "forward"));
}

#[test]
fn lookup_and_classification_contracts() {
    let mut registry = ToolRegistry::new();
    let lookup = spec("lookup", &["order_id"], &["ticket"]);
    registry.register(ScriptedTool::new(lookup.clone())).unwrap();

    assert_eq!(registry.spec("lookup").unwrap(), &lookup);
    assert_eq!(registry.lookup("teleport").unwrap_err().name, "teleport");
    assert!(registry.register(ScriptedTool::new(lookup)).is_err());

    let classifier = KeywordClassifier::standard();
    assert_eq!(
        classifier.classify("the weather is lovely today"),
        ScenarioCategory::MerchantOverloaded
    );
    assert_eq!(classifier.classify("DAMAGED box"), ScenarioCategory::Dispute);
}
