// src/tools/notification.rs

use std::time::Duration;

use serde_json::json;
use tracing::info;

use crate::context::RuntimeContext;
use crate::error::{ConfigurationError, DomainActionError};
use crate::tools::{Simulation, Tool, ToolInput, ToolRegistry, ToolResult, ToolSpec, require_str};

pub struct NotifyCustomerTool {
    sim: Simulation,
}

impl Tool for NotifyCustomerTool {
    fn name(&self) -> &str {
        "notify_customer"
    }

    fn description(&self) -> &str {
        "Sends a push notification to the customer."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("customer_id", "string", "Customer to notify", true)
            .input("message", "string", "Notification text", true)
            .outputs(&["customer_id", "message", "channel"])
            .tags(&["notification", "customer"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let customer_id = require_str(self.name(), input, "customer_id")?;
        let message = require_str(self.name(), input, "message")?;
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(300), &mut rng)?;

        info!(customer_id, message, "customer notified");
        Ok(ToolResult::new("sent")
            .with("customer_id", customer_id)
            .with("message", message)
            .with("channel", "push"))
    }
}

/// Shared body of the two-party notifications.
fn notify_pair(
    tool: &dyn Tool,
    sim: &Simulation,
    ctx: &RuntimeContext,
    input: &ToolInput,
) -> Result<ToolResult, DomainActionError> {
    let customer_id = require_str(tool.name(), input, "customer_id")?;
    let driver_id = require_str(tool.name(), input, "driver_id")?;
    let message = require_str(tool.name(), input, "message")?;
    let mut rng = sim.rng(ctx, tool.name(), input);
    sim.call(ctx, tool.name(), Duration::from_millis(300), &mut rng)?;

    info!(action = tool.name(), customer_id, driver_id, message, "parties notified");
    Ok(ToolResult::new("sent")
        .with("recipients", json!([customer_id, driver_id]))
        .with("message", message))
}

pub struct NotifyResolutionTool {
    sim: Simulation,
}

impl Tool for NotifyResolutionTool {
    fn name(&self) -> &str {
        "notify_resolution"
    }

    fn description(&self) -> &str {
        "Tells customer and driver how their dispute was resolved."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("customer_id", "string", "Customer party", true)
            .input("driver_id", "string", "Driver party", true)
            .input("message", "string", "Resolution text", true)
            .outputs(&["recipients", "message"])
            .tags(&["notification", "dispute"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        notify_pair(self, &self.sim, ctx, input)
    }
}

pub struct NotifyPassengerAndDriverTool {
    sim: Simulation,
}

impl Tool for NotifyPassengerAndDriverTool {
    fn name(&self) -> &str {
        "notify_passenger_and_driver"
    }

    fn description(&self) -> &str {
        "Sends the same update to passenger and driver at once so both see the new plan."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("customer_id", "string", "Passenger or customer", true)
            .input("driver_id", "string", "Driver", true)
            .input("message", "string", "Update text", true)
            .outputs(&["recipients", "message"])
            .tags(&["notification", "traffic"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        notify_pair(self, &self.sim, ctx, input)
    }
}

pub(crate) fn register(registry: &mut ToolRegistry, sim: &Simulation) -> Result<(), ConfigurationError> {
    registry.register(NotifyCustomerTool { sim: sim.clone() })?;
    registry.register(NotifyResolutionTool { sim: sim.clone() })?;
    registry.register(NotifyPassengerAndDriverTool { sim: sim.clone() })?;
    Ok(())
}
