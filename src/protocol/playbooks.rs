// src/protocol/playbooks.rs

//! Fixed resolution plans, one per scenario category.

use std::collections::HashMap;

use crate::error::ConfigurationError;
use crate::model::ScenarioCategory;
use crate::protocol::{Plan, PlanStep, SummaryTemplate};
use crate::tools::ToolRegistry;
use crate::validation::plan::ensure_valid;

pub fn standard_plan(category: ScenarioCategory) -> Plan {
    match category {
        ScenarioCategory::Dispute => dispute(),
        ScenarioCategory::RecipientUnavailable => recipient_unavailable(),
        ScenarioCategory::TrafficObstruction => traffic_obstruction(),
        ScenarioCategory::MerchantOverloaded => merchant_overloaded(),
    }
}

fn dispute() -> Plan {
    Plan::new("dispute", SummaryTemplate::Dispute)
        .step(
            PlanStep::new("s1", "initiate_mediation_flow")
                .scenario("order_id", "order_id")
                .scenario("customer_id", "customer_id")
                .scenario("driver_id", "driver_id")
                .export("mediation_id"),
        )
        .step(
            PlanStep::new("s2", "collect_evidence")
                .from_step("mediation_id", "s1", "mediation_id")
                .export("evidence"),
        )
        .step(
            PlanStep::new("s3", "analyze_evidence")
                .from_step("evidence", "s2", "evidence")
                .export("fault"),
        )
        .step(
            PlanStep::new("s4", "issue_instant_refund")
                .scenario("order_id", "order_id")
                .scenario("customer_id", "customer_id")
                .template("reason", "Damaged order; fault attributed to {s3.fault}"),
        )
        .step(
            PlanStep::new("s5", "exonerate_driver")
                .scenario("driver_id", "driver_id")
                .context("mediation_id", "mediation_id"),
        )
        .step(
            PlanStep::new("s6", "log_merchant_packaging_feedback")
                .scenario("merchant_id", "merchant_id")
                .template("feedback", "Order {scenario.order_id}: {s3.rationale}"),
        )
        .step(
            PlanStep::new("s7", "notify_resolution")
                .scenario("customer_id", "customer_id")
                .scenario("driver_id", "driver_id")
                .template(
                    "message",
                    "Dispute {context.mediation_id} resolved: refund issued for \
                     {scenario.order_id} and the driver has been cleared.",
                ),
        )
}

fn recipient_unavailable() -> Plan {
    Plan::new("recipient_unavailable", SummaryTemplate::RecipientUnavailable)
        .step(
            PlanStep::new("s1", "contact_recipient_via_chat")
                .scenario("customer_id", "customer_id")
                .literal(
                    "message",
                    "Your driver has arrived but couldn't reach you. Where should we leave your order?",
                ),
        )
        .step(
            PlanStep::new("s2", "suggest_safe_drop_off")
                .scenario("order_id", "order_id")
                .from_step("suggestion", "s1", "response")
                .export("drop_off"),
        )
        .step(PlanStep::new("s3", "find_nearby_locker").scenario("destination", "destination"))
        .step(
            PlanStep::new("s4", "notify_customer")
                .scenario("customer_id", "customer_id")
                .template(
                    "message",
                    "Order {scenario.order_id}: safe drop-off {s2.status} ({s2.drop_off}); \
                     locker {s3.locker_id} at {s3.address} is held as a fallback.",
                ),
        )
}

fn traffic_obstruction() -> Plan {
    Plan::new("traffic_obstruction", SummaryTemplate::TrafficObstruction)
        .step(PlanStep::new("s1", "get_driver_location").scenario("driver_id", "driver_id"))
        .step(
            PlanStep::new("s2", "check_traffic")
                .from_step("start_point", "s1", "location")
                .scenario("end_point", "destination"),
        )
        .step(PlanStep::new("s3", "check_flight_status").scenario("flight_number", "flight_number"))
        .step(
            PlanStep::new("s4", "calculate_alternative_route")
                .from_step("start_point", "s1", "location")
                .scenario("end_point", "destination")
                .export("route_id"),
        )
        .step(
            PlanStep::new("s5", "reroute_driver")
                .scenario("driver_id", "driver_id")
                .from_step("route", "s4", "route_id")
                .from_step("eta_minutes", "s4", "eta_minutes")
                .template("reason", "{s2.congestion} traffic on the original route"),
        )
        .step(
            PlanStep::new("s6", "notify_passenger_and_driver")
                .scenario("customer_id", "customer_id")
                .scenario("driver_id", "driver_id")
                .template(
                    "message",
                    "Rerouting via {s4.via} to avoid an obstruction. New ETA {s5.eta_minutes} min; \
                     flight {scenario.flight_number} is {s3.flight_state}.",
                ),
        )
}

fn merchant_overloaded() -> Plan {
    Plan::new("merchant_overloaded", SummaryTemplate::MerchantOverloaded)
        .step(PlanStep::new("s1", "get_merchant_status").scenario("merchant_id", "merchant_id"))
        .step(
            PlanStep::new("s2", "notify_customer")
                .scenario("customer_id", "customer_id")
                .template(
                    "message",
                    "Your order {scenario.order_id} is delayed: the restaurant {s1.availability}. \
                     We'll keep you posted.",
                ),
        )
        .step(
            PlanStep::new("s3", "reroute_driver")
                .scenario("driver_id", "driver_id")
                .literal("route", "interim short-haul delivery")
                .template("reason", "merchant {s1.merchant_state}: {s1.availability}"),
        )
        .step(
            PlanStep::new("s4", "get_nearby_merchants")
                .scenario("merchant_id", "merchant_id")
                .literal("radius_km", 2.0),
        )
}

/// The fixed plan for every category, checked against a registry once.
#[derive(Debug, Clone)]
pub struct Playbooks {
    plans: HashMap<ScenarioCategory, Plan>,
}

impl Playbooks {
    pub fn standard(registry: &ToolRegistry) -> Result<Self, ConfigurationError> {
        Self::from_plans(
            ScenarioCategory::ALL.map(|category| (category, standard_plan(category))),
            registry,
        )
    }

    /// Validates each plan before accepting it.
    pub fn from_plans(
        plans: impl IntoIterator<Item = (ScenarioCategory, Plan)>,
        registry: &ToolRegistry,
    ) -> Result<Self, ConfigurationError> {
        let mut map = HashMap::new();
        for (category, plan) in plans {
            ensure_valid(&plan, registry)?;
            map.insert(category, plan);
        }
        Ok(Self { plans: map })
    }

    pub fn get(&self, category: ScenarioCategory) -> Option<&Plan> {
        self.plans.get(&category)
    }
}
