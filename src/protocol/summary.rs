// src/protocol/summary.rs

use serde_json::Value;

use crate::model::Scenario;
use crate::protocol::{ExecutionTrace, SummaryTemplate};
use crate::tools::{ToolResult, display_value};

/// Renders the closing resolution text for a completed run.
pub fn render(template: SummaryTemplate, scenario: &Scenario, trace: &ExecutionTrace) -> String {
    match template {
        SummaryTemplate::Dispute => dispute(scenario, trace),
        SummaryTemplate::RecipientUnavailable => recipient_unavailable(scenario, trace),
        SummaryTemplate::TrafficObstruction => traffic_obstruction(scenario, trace),
        SummaryTemplate::MerchantOverloaded => merchant_overloaded(scenario, trace),
        SummaryTemplate::Generic => generic(trace),
    }
}

fn text(result: Option<&ToolResult>, field: &str, fallback: &str) -> String {
    result
        .and_then(|r| r.get(field))
        .filter(|v| !v.is_null())
        .map(display_value)
        .unwrap_or_else(|| fallback.to_string())
}

fn scenario_field<'a>(scenario: &'a Scenario, name: &str) -> &'a str {
    scenario.field(name).unwrap_or("unknown")
}

fn dispute(scenario: &Scenario, trace: &ExecutionTrace) -> String {
    let analysis = trace.result_of("analyze_evidence");
    let refund = trace.result_of("issue_instant_refund");
    format!(
        "Dispute on {order} resolved: customer {customer} refunded {amount} ({refund_id}); \
         driver {driver} exonerated with rating protected; fault attributed to {fault} \
         and packaging feedback logged for {merchant}.",
        order = scenario_field(scenario, "order_id"),
        customer = scenario_field(scenario, "customer_id"),
        amount = text(refund, "amount", "in full"),
        refund_id = text(refund, "refund_id", "no refund id"),
        driver = scenario_field(scenario, "driver_id"),
        fault = text(analysis, "fault", "undetermined"),
        merchant = scenario_field(scenario, "merchant_id"),
    )
}

fn recipient_unavailable(scenario: &Scenario, trace: &ExecutionTrace) -> String {
    let order = scenario_field(scenario, "order_id");
    let drop_off = trace.result_of("suggest_safe_drop_off");
    let approved = drop_off.is_some_and(|r| r.status() == "approved");
    if approved {
        format!(
            "Recipient unavailable for {order}: delivered to {place} as the recipient asked.",
            place = text(drop_off, "drop_off", "a safe location"),
        )
    } else {
        let locker = trace.result_of("find_nearby_locker");
        format!(
            "Recipient unavailable for {order}: no safe drop-off approved, parcel redirected \
             to locker {locker_id} at {address} ({distance} m away).",
            locker_id = text(locker, "locker_id", "unassigned"),
            address = text(locker, "address", "the nearest hub"),
            distance = text(locker, "distance_m", "?"),
        )
    }
}

fn traffic_obstruction(scenario: &Scenario, trace: &ExecutionTrace) -> String {
    let route = trace.result_of("calculate_alternative_route");
    let reroute = trace.result_of("reroute_driver");
    let traffic = trace.result_of("check_traffic");
    let flight = trace.result_of("check_flight_status");
    let eta = reroute
        .and_then(|r| r.get("eta_minutes"))
        .or_else(|| route.and_then(|r| r.get("eta_minutes")))
        .map(display_value)
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "Obstruction on the route ({congestion} traffic): driver {driver} rerouted via {via} \
         on {route_id}, new ETA {eta} min; flight {flight_number} is {flight_state}. \
         Passenger and driver notified.",
        congestion = text(traffic, "congestion", "unknown"),
        driver = scenario_field(scenario, "driver_id"),
        via = text(route, "via", "an alternative road"),
        route_id = text(route, "route_id", "a new route"),
        flight_number = scenario_field(scenario, "flight_number"),
        flight_state = text(flight, "flight_state", "unknown").replace('_', " "),
    )
}

fn merchant_overloaded(scenario: &Scenario, trace: &ExecutionTrace) -> String {
    let status = trace.result_of("get_merchant_status");
    let nearby = trace.result_of("get_nearby_merchants");
    let notified = trace
        .result_of("notify_customer")
        .is_some_and(|r| r.status() == "sent");
    let alternatives = nearby
        .and_then(|r| r.get("merchants"))
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|m| m.get("name").and_then(Value::as_str).or_else(|| m.as_str()))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|names| !names.is_empty())
        .unwrap_or_else(|| "none found".to_string());
    let state = text(status, "merchant_state", "overloaded");
    let condition = if state == "closed" {
        "is closed".to_string()
    } else {
        format!("is {state} with a {} min prep time", text(status, "prep_time_minutes", "?"))
    };
    format!(
        "Merchant {merchant} {condition}. Customer {customer} \
         {notice}; driver {driver} reassigned meanwhile. Alternatives nearby: {alternatives}.",
        merchant = scenario_field(scenario, "merchant_id"),
        customer = scenario_field(scenario, "customer_id"),
        notice = if notified { "was notified of the delay" } else { "could not be notified" },
        driver = scenario_field(scenario, "driver_id"),
    )
}

fn generic(trace: &ExecutionTrace) -> String {
    if trace.is_empty() {
        return "No actions were taken.".to_string();
    }
    let steps = trace
        .entries()
        .iter()
        .map(|e| format!("{} ({})", e.action, e.result.status()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Executed {} actions: {steps}.", trace.len())
}
