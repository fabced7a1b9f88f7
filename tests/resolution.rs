use std::io::Write;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use synapse::agent::{Agent, Coordinator, Resolution};
use synapse::config::{Config, SimulationConfig};
use synapse::context::RuntimeContext;
use synapse::error::{ExecutionFailure, ResolutionError};
use synapse::model::ScenarioCategory;
use synapse::tools::{Simulation, standard_catalogue};
use tokio_util::sync::CancellationToken;

fn coordinator(seed: u64) -> Coordinator {
    Coordinator::builder(standard_catalogue(&Simulation::instant(seed)).unwrap())
        .build()
        .unwrap()
}

/// Trace without timestamps or timings.
fn comparable(resolution: &Resolution) -> Vec<(String, String, Value, Value, u32)> {
    resolution
        .trace
        .entries()
        .iter()
        .map(|e| {
            (
                e.step.clone(),
                e.action.clone(),
                Value::Object(e.resolved_inputs.clone()),
                serde_json::to_value(&e.result).unwrap(),
                e.attempts,
            )
        })
        .collect()
}

const DISPUTE: &str =
    "Customer cust-456 says order-789 arrived with a spilled drink and driver-123 blames the restaurant";

#[test]
fn dispute_runs_mediation_sequence() {
    let resolution = coordinator(7).resolve(DISPUTE).unwrap();

    assert_eq!(resolution.category, ScenarioCategory::Dispute);
    assert_eq!(
        resolution.trace.actions(),
        vec![
            "initiate_mediation_flow",
            "collect_evidence",
            "analyze_evidence",
            "issue_instant_refund",
            "exonerate_driver",
            "log_merchant_packaging_feedback",
            "notify_resolution",
        ]
    );
    assert!(resolution.output.contains("refunded"));
    assert!(resolution.output.contains("exonerated"));

    let mediation = resolution.trace.step("s1").unwrap();
    assert_eq!(mediation.resolved_inputs["order_id"], "order-789");
    assert_eq!(mediation.resolved_inputs["customer_id"], "cust-456");
    assert_eq!(mediation.resolved_inputs["driver_id"], "driver-123");

    // The exoneration read the mediation id back out of the context store.
    let mediation_id = mediation.result.get("mediation_id").unwrap();
    assert_eq!(
        &resolution.trace.step("s5").unwrap().resolved_inputs["mediation_id"],
        mediation_id
    );
    assert_eq!(resolution.context.get("mediation_id"), Some(mediation_id));
}

#[test]
fn recipient_reply_feeds_drop_off_suggestion() {
    let resolution = coordinator(11)
        .resolve("The recipient is not answering the door for order-321")
        .unwrap();

    assert_eq!(resolution.category, ScenarioCategory::RecipientUnavailable);
    assert_eq!(resolution.trace.actions()[0], "contact_recipient_via_chat");
    let chat = resolution.trace.step("s1").unwrap();
    let drop_off = resolution.trace.step("s2").unwrap();
    assert_eq!(drop_off.action, "suggest_safe_drop_off");
    assert_eq!(
        drop_off.resolved_inputs.get("suggestion"),
        chat.result.get("response")
    );
}

#[test]
fn traffic_and_merchant_plans_run_to_completion() {
    let coordinator = coordinator(3);

    let traffic = coordinator
        .resolve("Major accident on the highway, passenger has flight MH370 to catch")
        .unwrap();
    assert_eq!(traffic.category, ScenarioCategory::TrafficObstruction);
    assert_eq!(
        traffic.trace.step("s3").unwrap().resolved_inputs["flight_number"],
        "MH370"
    );
    assert_eq!(traffic.trace.actions().last(), Some(&"notify_passenger_and_driver"));

    let merchant = coordinator
        .resolve("The kitchen at merchant-77 is slammed with orders")
        .unwrap();
    assert_eq!(merchant.category, ScenarioCategory::MerchantOverloaded);
    assert_eq!(merchant.trace.actions()[0], "get_merchant_status");
    assert!(merchant.output.contains("merchant-77"));
}

#[test]
fn traffic_notification_uses_the_computed_route_eta() {
    let traffic = coordinator(8)
        .resolve("Road closed by an accident, passenger is catching flight AK612")
        .unwrap();

    let route_eta = traffic.trace.step("s4").unwrap().result.get("eta_minutes").unwrap();
    let reroute = traffic.trace.step("s5").unwrap();
    assert_eq!(&reroute.resolved_inputs["eta_minutes"], route_eta);
    assert_eq!(reroute.result.get("eta_minutes"), Some(route_eta));
    let message = traffic.trace.step("s6").unwrap().resolved_inputs["message"].as_str().unwrap();
    assert!(message.contains(&format!("New ETA {route_eta} min")));
}

#[test]
fn closed_merchant_is_not_reported_as_a_zero_minute_delay() {
    let closed = (0..64)
        .map(|seed| coordinator(seed).resolve("The kitchen at merchant-77 is slammed").unwrap())
        .find(|r| r.trace.step("s1").unwrap().result.get_str("merchant_state") == Some("closed"))
        .expect("some seed closes the merchant");

    let message = closed.trace.step("s2").unwrap().resolved_inputs["message"].as_str().unwrap();
    assert!(message.contains("is closed"));
    assert!(!message.contains("0 more minutes"));
    assert!(closed.output.contains("merchant-77 is closed."));
    assert!(!closed.output.contains("0 min"));
}

#[test]
fn same_seed_gives_identical_resolutions() {
    let first = coordinator(99).resolve(DISPUTE).unwrap();
    let second = coordinator(99).resolve(DISPUTE).unwrap();

    assert_ne!(first.case_id, second.case_id);
    assert_eq!(comparable(&first), comparable(&second));
    assert_eq!(first.output, second.output);
}

#[test]
fn cancellation_mid_run_aborts_with_partial_trace() {
    let mut simulation = SimulationConfig::default();
    simulation.seed = Some(5);
    let coordinator = Coordinator::builder(standard_catalogue(&Simulation::from_config(&simulation)).unwrap())
        .build()
        .unwrap();

    let token = CancellationToken::new();
    let canceller = token.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        canceller.cancel();
    });

    let ctx = RuntimeContext::new("case-cancel").with_cancellation(token);
    let err = coordinator.resolve_with(DISPUTE, ctx).unwrap_err();
    handle.join().unwrap();

    match &err {
        ResolutionError::Execution(e) => assert!(matches!(e.cause, ExecutionFailure::Cancelled)),
        other => panic!("expected execution error, got {other:?}"),
    }
    // The first dispute step alone takes longer than the cancel delay.
    assert!(err.partial_trace().unwrap().len() < 7);
    assert_eq!(coordinator.store().active_sessions(), 0);
}

#[test]
fn concurrent_resolutions_keep_separate_sessions() {
    let coordinator = coordinator(21);
    let texts = [
        DISPUTE,
        "Nobody is home to receive order-1",
        "Road closed near the airport",
        "Restaurant is behind on orders",
    ];

    let resolutions: Vec<Resolution> = thread::scope(|scope| {
        let handles: Vec<_> = texts
            .iter()
            .cycle()
            .take(12)
            .map(|text| {
                let coordinator = &coordinator;
                scope.spawn(move || coordinator.resolve(text))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    });

    let mut case_ids: Vec<_> = resolutions.iter().map(|r| r.case_id.clone()).collect();
    case_ids.sort();
    case_ids.dedup();
    assert_eq!(case_ids.len(), 12);
    for resolution in resolutions.iter().filter(|r| r.category == ScenarioCategory::Dispute) {
        assert!(resolution.context.contains_key("mediation_id"));
    }
    for resolution in resolutions.iter().filter(|r| r.category != ScenarioCategory::Dispute) {
        assert!(!resolution.context.contains_key("mediation_id"));
    }
    assert_eq!(coordinator.store().active_sessions(), 0);
}

#[test]
fn resolves_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
planner = "scripted"

[simulation]
seed = 17
latency_scale = 0.0

[scenario_defaults]
merchant_id = "merchant-555"
"#
    )
    .unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    let coordinator = Coordinator::from_config(&config).unwrap();
    let resolution = coordinator.resolve("Orders are piling up at the counter").unwrap();

    assert_eq!(resolution.planner, "scripted");
    assert_eq!(
        resolution.trace.step("s1").unwrap().resolved_inputs["merchant_id"],
        "merchant-555"
    );
}
