// src/tools/recipient.rs

use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::info;

use crate::context::RuntimeContext;
use crate::error::{ConfigurationError, DomainActionError};
use crate::tools::{Simulation, Tool, ToolInput, ToolRegistry, ToolResult, ToolSpec, require_str};

pub const NO_RESPONSE: &str = "No response from recipient.";

const REPLIES: &[&str] = &[
    "Please leave it with the building concierge.",
    "Leave it at the front door, thanks!",
    "Can you drop it with my neighbour in unit 12B?",
];

pub struct RecipientChatTool {
    sim: Simulation,
}

impl Tool for RecipientChatTool {
    fn name(&self) -> &str {
        "contact_recipient_via_chat"
    }

    fn description(&self) -> &str {
        "Messages the recipient in-app and waits briefly for a reply."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("customer_id", "string", "Recipient to contact", true)
            .input("message", "string", "Message to send", true)
            .outputs(&["response", "responded"])
            .tags(&["recipient", "chat"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let customer_id = require_str(self.name(), input, "customer_id")?;
        require_str(self.name(), input, "message")?;
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_secs(1), &mut rng)?;

        let reply = if rng.gen_bool(0.75) {
            REPLIES.choose(&mut rng).copied()
        } else {
            None
        };
        info!(customer_id, responded = reply.is_some(), "recipient contacted");

        Ok(match reply {
            Some(text) => ToolResult::success()
                .with("response", text)
                .with("responded", true),
            None => ToolResult::new("no_response")
                .with("response", NO_RESPONSE)
                .with("responded", false),
        })
    }
}

pub struct SafeDropOffTool {
    sim: Simulation,
}

impl SafeDropOffTool {
    fn drop_off_for(suggestion: &str) -> Option<&'static str> {
        let lower = suggestion.to_lowercase();
        if lower.contains("no response") {
            None
        } else if lower.contains("concierge") || lower.contains("reception") {
            Some("building concierge")
        } else if lower.contains("neighbour") || lower.contains("neighbor") {
            Some("neighbour's unit")
        } else if lower.contains("door") || lower.contains("porch") {
            Some("front door")
        } else {
            Some("safe location named by recipient")
        }
    }
}

impl Tool for SafeDropOffTool {
    fn name(&self) -> &str {
        "suggest_safe_drop_off"
    }

    fn description(&self) -> &str {
        "Proposes a safe place to leave the order based on the recipient's reply."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("order_id", "string", "Order being delivered", true)
            .input("suggestion", "string", "Recipient's reply or instruction", true)
            .outputs(&["drop_off", "reason"])
            .tags(&["recipient", "delivery"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let order_id = require_str(self.name(), input, "order_id")?;
        let suggestion = require_str(self.name(), input, "suggestion")?;
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(400), &mut rng)?;

        let result = match Self::drop_off_for(suggestion) {
            None => ToolResult::new("rejected")
                .with("drop_off", "none")
                .with("reason", "recipient did not reply"),
            Some(_) if rng.gen_bool(0.1) => ToolResult::new("rejected")
                .with("drop_off", "none")
                .with("reason", "location fails the high-value order policy"),
            Some(place) => ToolResult::new("approved")
                .with("drop_off", place)
                .with("reason", "recipient instruction"),
        };
        info!(order_id, status = result.status(), "safe drop-off evaluated");
        Ok(result)
    }
}

const LOCKER_SITES: &[&str] = &[
    "Level 1, Sunway Mall",
    "KL Sentral concourse",
    "Petron station, Jalan Klang Lama",
    "Mid Valley, North Court",
];

pub struct LockerSearchTool {
    sim: Simulation,
}

impl Tool for LockerSearchTool {
    fn name(&self) -> &str {
        "find_nearby_locker"
    }

    fn description(&self) -> &str {
        "Finds the closest parcel locker with a free slot."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("destination", "string", "Delivery address to search around", true)
            .outputs(&["locker_id", "address", "distance_m"])
            .tags(&["recipient", "locker"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let destination = require_str(self.name(), input, "destination")?;
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(600), &mut rng)?;

        let locker_id = format!("locker-{:02}", rng.gen_range(1..100));
        let address = LOCKER_SITES.choose(&mut rng).copied().unwrap_or("nearest hub");
        let distance: u32 = rng.gen_range(100..=900);
        info!(destination, %locker_id, address, distance, "locker found");

        Ok(ToolResult::success()
            .with("locker_id", locker_id)
            .with("address", address)
            .with("distance_m", distance))
    }
}

pub(crate) fn register(registry: &mut ToolRegistry, sim: &Simulation) -> Result<(), ConfigurationError> {
    registry.register(RecipientChatTool { sim: sim.clone() })?;
    registry.register(SafeDropOffTool { sim: sim.clone() })?;
    registry.register(LockerSearchTool { sim: sim.clone() })?;
    Ok(())
}
