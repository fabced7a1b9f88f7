// src/tools/dispute.rs

use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::context::RuntimeContext;
use crate::error::{ConfigurationError, DomainActionError};
use crate::tools::{
    Simulation, Tool, ToolInput, ToolRegistry, ToolResult, ToolSpec, optional_str, require_str,
    require_value,
};

pub struct InitiateMediationTool {
    sim: Simulation,
}

impl Tool for InitiateMediationTool {
    fn name(&self) -> &str {
        "initiate_mediation_flow"
    }

    fn description(&self) -> &str {
        "Opens a real-time mediation session between customer and driver for an order."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("order_id", "string", "Disputed order", true)
            .input("customer_id", "string", "Customer party", true)
            .input("driver_id", "string", "Driver party", true)
            .outputs(&["mediation_id", "channel"])
            .tags(&["dispute", "mediation"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let order_id = require_str(self.name(), input, "order_id")?;
        let customer_id = require_str(self.name(), input, "customer_id")?;
        let driver_id = require_str(self.name(), input, "driver_id")?;
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(600), &mut rng)?;

        let mediation_id = format!("med-{}-{:04}", order_id, rng.gen_range(0..10_000));
        info!(order_id, customer_id, driver_id, %mediation_id, "mediation opened");

        Ok(ToolResult::success()
            .with("mediation_id", mediation_id)
            .with("channel", "in-app"))
    }
}

const DRIVER_STATEMENTS: &[&str] = &[
    "Bag was sealed at pickup and handled upright throughout.",
    "Merchant handed over the order already damp at the bottom.",
    "Drove carefully; noticed nothing wrong at handover.",
];

const PACKAGING: &[&str] = &["leaking container", "torn bag", "crushed box", "loose lid"];

pub struct CollectEvidenceTool {
    sim: Simulation,
}

impl Tool for CollectEvidenceTool {
    fn name(&self) -> &str {
        "collect_evidence"
    }

    fn description(&self) -> &str {
        "Gathers photos and statements from both parties of a mediation."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("mediation_id", "string", "Mediation session", true)
            .outputs(&["evidence"])
            .tags(&["dispute", "evidence"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let mediation_id = require_str(self.name(), input, "mediation_id")?;
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_secs(1), &mut rng)?;

        let evidence = json!({
            "mediation_id": mediation_id,
            "customer_photos": rng.gen_range(1..=4),
            "driver_statement": DRIVER_STATEMENTS.choose(&mut rng).copied().unwrap_or_default(),
            "packaging_condition": PACKAGING.choose(&mut rng).copied().unwrap_or_default(),
            "seal_intact": rng.gen_bool(0.7),
        });
        info!(mediation_id, "evidence collected");

        Ok(ToolResult::success().with("evidence", evidence))
    }
}

pub struct AnalyzeEvidenceTool {
    sim: Simulation,
}

impl Tool for AnalyzeEvidenceTool {
    fn name(&self) -> &str {
        "analyze_evidence"
    }

    fn description(&self) -> &str {
        "Weighs collected evidence and determines who is at fault."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("evidence", "object", "Evidence bundle from collect_evidence", true)
            .outputs(&["fault", "confidence", "rationale"])
            .tags(&["dispute", "analysis"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let evidence = require_value(self.name(), input, "evidence")?
            .as_object()
            .ok_or_else(|| DomainActionError::invalid_input(self.name(), "evidence", "an object"))?;
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(800), &mut rng)?;

        let sealed = evidence.get("seal_intact").and_then(Value::as_bool).unwrap_or(false);
        let packaging = evidence
            .get("packaging_condition")
            .and_then(Value::as_str)
            .unwrap_or("unknown packaging");
        let (fault, confidence, rationale) = if sealed {
            (
                "merchant",
                rng.gen_range(0.80..0.99),
                format!("seal intact at delivery; damage consistent with {packaging}"),
            )
        } else {
            (
                "undetermined",
                rng.gen_range(0.40..0.65),
                format!("seal broken; {packaging} could have occurred in transit or at pickup"),
            )
        };
        let confidence = (confidence * 100.0_f64).round() / 100.0;
        info!(fault, confidence, "evidence analysed");

        Ok(ToolResult::success()
            .with("fault", fault)
            .with("confidence", confidence)
            .with("rationale", rationale))
    }
}

pub struct InstantRefundTool {
    sim: Simulation,
}

impl Tool for InstantRefundTool {
    fn name(&self) -> &str {
        "issue_instant_refund"
    }

    fn description(&self) -> &str {
        "Issues an immediate refund to the customer for an order."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("order_id", "string", "Order being refunded", true)
            .input("customer_id", "string", "Customer receiving the refund", true)
            .input("reason", "string", "Reason recorded with the refund", false)
            .outputs(&["refund_id", "amount"])
            .tags(&["payment", "refund"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let order_id = require_str(self.name(), input, "order_id")?;
        let customer_id = require_str(self.name(), input, "customer_id")?;
        let reason = optional_str(input, "reason").unwrap_or("service recovery");
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(700), &mut rng)?;

        let amount = (rng.gen_range(8.0..45.0_f64) * 100.0).round() / 100.0;
        let refund_id = format!("rf-{:06}", rng.gen_range(0..1_000_000));
        info!(order_id, customer_id, amount, reason, %refund_id, "refund approved");

        Ok(ToolResult::new("approved")
            .with("refund_id", refund_id)
            .with("amount", amount))
    }
}

pub struct ExonerateDriverTool {
    sim: Simulation,
}

impl Tool for ExonerateDriverTool {
    fn name(&self) -> &str {
        "exonerate_driver"
    }

    fn description(&self) -> &str {
        "Clears the driver of fault so the incident does not affect their rating."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("driver_id", "string", "Driver to clear", true)
            .input("mediation_id", "string", "Mediation that reached the finding", true)
            .outputs(&["driver_id", "rating_protected"])
            .tags(&["dispute", "driver"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let driver_id = require_str(self.name(), input, "driver_id")?;
        let mediation_id = require_str(self.name(), input, "mediation_id")?;
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(400), &mut rng)?;

        info!(driver_id, mediation_id, "driver exonerated");
        Ok(ToolResult::success()
            .with("driver_id", driver_id)
            .with("rating_protected", true))
    }
}

pub struct MerchantFeedbackTool {
    sim: Simulation,
}

impl Tool for MerchantFeedbackTool {
    fn name(&self) -> &str {
        "log_merchant_packaging_feedback"
    }

    fn description(&self) -> &str {
        "Records packaging feedback against a merchant for quality follow-up."
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name(), self.description())
            .input("merchant_id", "string", "Merchant receiving the feedback", true)
            .input("feedback", "string", "Feedback text", true)
            .outputs(&["feedback_id"])
            .tags(&["merchant", "feedback"])
    }

    fn execute(&self, ctx: &RuntimeContext, input: &ToolInput) -> Result<ToolResult, DomainActionError> {
        let merchant_id = require_str(self.name(), input, "merchant_id")?;
        let feedback = require_str(self.name(), input, "feedback")?;
        let mut rng = self.sim.rng(ctx, self.name(), input);
        self.sim.call(ctx, self.name(), Duration::from_millis(300), &mut rng)?;

        if feedback.len() > 2_000 {
            warn!(merchant_id, len = feedback.len(), "long feedback truncated by backend");
        }
        let feedback_id = format!("fb-{:05}", rng.gen_range(0..100_000));
        info!(merchant_id, %feedback_id, "packaging feedback logged");

        Ok(ToolResult::new("logged").with("feedback_id", feedback_id))
    }
}

pub(crate) fn register(registry: &mut ToolRegistry, sim: &Simulation) -> Result<(), ConfigurationError> {
    registry.register(InitiateMediationTool { sim: sim.clone() })?;
    registry.register(CollectEvidenceTool { sim: sim.clone() })?;
    registry.register(AnalyzeEvidenceTool { sim: sim.clone() })?;
    registry.register(InstantRefundTool { sim: sim.clone() })?;
    registry.register(ExonerateDriverTool { sim: sim.clone() })?;
    registry.register(MerchantFeedbackTool { sim: sim.clone() })?;
    Ok(())
}
