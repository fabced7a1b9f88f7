// src/tools/merchant.rs

use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::{Value, json};
use tracing::info;

use crate::context::RuntimeContext;
use crate::error::{ConfigurationError, DomainActionError};
use crate::tools::{Simulation, Tool, ToolInput, ToolRegistry, ToolResult, ToolSpec, require_str};

pub struct MerchantStatusTool {
    sim: Simulation,
}

impl Tool for MerchantStatusTool {
    fn name(&self) -> &str {
        "get_merchant_status"
    }

    fn description(&self) -> &str {
        "Checks whether a merchant is open, closed or busy, and its current prep time."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("merchant_id", "string", "Merchant to query", true)
            .outputs(&["merchant_id", "merchant_state", "prep_time_minutes", "availability"])
            .tags(&["merchant", "status"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let merchant_id = require_str(self.name(), input, "merchant_id")?;
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(500), &mut rng)?;

        let state = ["open", "closed", "busy"]
            .choose(&mut rng)
            .copied()
            .unwrap_or("busy");
        let prep_time: u32 = match state {
            "busy" => rng.gen_range(25..=50),
            "open" => rng.gen_range(5..=15),
            _ => 0,
        };
        let availability = if state == "closed" {
            "is closed and cannot prepare orders right now".to_string()
        } else {
            format!("needs about {prep_time} more minutes")
        };
        info!(merchant_id, state, prep_time, "merchant status checked");

        Ok(ToolResult::success()
            .with("merchant_id", merchant_id)
            .with("merchant_state", state)
            .with("prep_time_minutes", prep_time)
            .with("availability", availability))
    }
}

pub struct NearbyMerchantsTool {
    sim: Simulation,
}

const NEARBY_NAMES: &[&str] = &[
    "Nasi Lemak Corner",
    "Golden Wok",
    "Mamak Express",
    "Satay Station",
    "Kopi & Co",
];

impl Tool for NearbyMerchantsTool {
    fn name(&self) -> &str {
        "get_nearby_merchants"
    }

    fn description(&self) -> &str {
        "Finds similar merchants near the given one with shorter prep times."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("merchant_id", "string", "Merchant to find alternatives for", true)
            .input("radius_km", "number", "Search radius in kilometres", false)
            .outputs(&["merchants", "count"])
            .tags(&["merchant", "search"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let merchant_id = require_str(self.name(), input, "merchant_id")?;
        let radius = input.get("radius_km").and_then(Value::as_f64).unwrap_or(2.0);
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(700), &mut rng)?;

        let count = rng.gen_range(1..=3);
        let merchants: Vec<Value> = NEARBY_NAMES
            .choose_multiple(&mut rng, count)
            .map(|name| {
                json!({
                    "merchant_id": format!("merchant-{:03}", rng.gen_range(100..1000)),
                    "name": name,
                    "prep_time_minutes": rng.gen_range(5..=15),
                    "distance_km": (rng.gen_range(0.2..radius.max(0.3)) * 10.0_f64).round() / 10.0,
                })
            })
            .collect();
        info!(merchant_id, found = merchants.len(), "nearby merchants found");

        Ok(ToolResult::success()
            .with("count", merchants.len())
            .with("merchants", merchants))
    }
}

pub(crate) fn register(registry: &mut ToolRegistry, sim: &Simulation) -> Result<(), ConfigurationError> {
    registry.register(MerchantStatusTool { sim: sim.clone() })?;
    registry.register(NearbyMerchantsTool { sim: sim.clone() })?;
    Ok(())
}
