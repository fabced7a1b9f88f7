// src/protocol/planner.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{ConfigurationError, PlanningError};
use crate::model::{SCENARIO_FIELDS, Scenario};
use crate::protocol::llm::Completion;
use crate::protocol::playbooks::Playbooks;
use crate::protocol::{Plan, PlanStep, SummaryTemplate};
use crate::tools::ToolRegistry;
use crate::validation::plan::{PlanValidationError, validate_plan};

/// Trait for producing a Plan for a classified scenario.
pub trait Planner: Send + Sync {
    fn name(&self) -> &str;
    fn plan(&self, scenario: &Scenario, registry: &ToolRegistry) -> Result<Plan, PlanningError>;
}

/// Serves the fixed playbook for the scenario's category.
#[derive(Debug, Clone)]
pub struct FixedPlanner {
    playbooks: Playbooks,
}

impl FixedPlanner {
    pub fn new(playbooks: Playbooks) -> Self {
        Self { playbooks }
    }

    pub fn standard(registry: &ToolRegistry) -> Result<Self, ConfigurationError> {
        Ok(Self::new(Playbooks::standard(registry)?))
    }
}

impl Planner for FixedPlanner {
    fn name(&self) -> &str {
        "scripted"
    }

    fn plan(&self, scenario: &Scenario, _registry: &ToolRegistry) -> Result<Plan, PlanningError> {
        self.playbooks
            .get(scenario.category)
            .cloned()
            .ok_or_else(|| PlanningError::NoPlan(scenario.category.to_string()))
    }
}

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("json block pattern"));

#[derive(Deserialize)]
struct PlannerResponse {
    plan: Vec<PlanStep>,
}

/// Asks a language model for a plan. Best-effort: the result is validated
/// like any other plan but carries only the generic summary.
pub struct LlmPlanner {
    llm: Box<dyn Completion>,
    corrections: u32,
}

impl LlmPlanner {
    pub fn new(llm: impl Completion + 'static) -> Self {
        Self {
            llm: Box::new(llm),
            corrections: 1,
        }
    }

    /// How many times a rejected plan is sent back with validation hints.
    pub fn with_corrections(mut self, corrections: u32) -> Self {
        self.corrections = corrections;
        self
    }

    fn propose(&self, prompt: &str, scenario: &Scenario) -> Result<Plan, PlanningError> {
        let raw = self.llm.complete(prompt)?;
        let json = JSON_BLOCK
            .find(&raw)
            .map(|m| m.as_str())
            .ok_or_else(|| PlanningError::Malformed("no JSON object in response".into()))?;
        let parsed: PlannerResponse =
            serde_json::from_str(json).map_err(|e| PlanningError::Malformed(e.to_string()))?;
        debug!(steps = parsed.plan.len(), "language model proposed a plan");

        Ok(Plan {
            name: format!("llm:{}", scenario.category),
            steps: parsed.plan,
            summary: SummaryTemplate::Generic,
        })
    }

    fn feedback(errors: &[PlanValidationError]) -> String {
        let mut text = String::from("\n### Your previous plan was rejected:\n");
        for error in errors {
            let (hint, example) = error.hint();
            text.push_str(&format!("- {error}. {hint}"));
            if let Some(example) = example {
                text.push_str(&format!(" Example: {example}"));
            }
            text.push('\n');
        }
        text.push_str("Return a corrected plan in the same JSON format.\n");
        text
    }

    fn prompt(&self, scenario: &Scenario, registry: &ToolRegistry) -> String {
        let catalogue = registry
            .catalogue()
            .into_iter()
            .map(|spec| {
                json!({
                    "name": spec.name,
                    "description": spec.description,
                    "input_schema": spec.input_schema,
                    "outputs": spec.output_fields,
                })
            })
            .collect::<Vec<_>>();
        let catalogue = serde_json::to_string_pretty(&catalogue).unwrap_or_default();
        let fields = SCENARIO_FIELDS.join(", ");

        format!(
            r#"You are the dispatcher of a last-mile delivery platform.

Produce a minimal plan in **strict JSON** that resolves the disruption below
using only the actions in the catalogue.

### Constraints:
- Every step has a unique "id", an "action" from the catalogue and "inputs".
- Each input is one of:
  {{ "literal": <value> }}
  {{ "scenario": "<field>" }}  where field is one of: {fields}
  {{ "step": {{ "step": "<earlier step id>", "field": "<output field>" }} }}
  {{ "template": "text with {{scenario.field}} or {{<step id>.<field>}} placeholders" }}
- A step may only reference steps that come before it.
- Supply every required input. Respond with JSON only.

### Output Format (strict JSON):
{{
  "plan": [
    {{ "id": "s1", "action": "get_merchant_status", "inputs": {{ "merchant_id": {{ "scenario": "merchant_id" }} }} }},
    {{ "id": "s2", "action": "notify_customer", "inputs": {{
        "customer_id": {{ "scenario": "customer_id" }},
        "message": {{ "template": "Prep time is {{s1.prep_time_minutes}} minutes." }} }} }}
  ]
}}

### Actions:
{catalogue}

### Disruption ({category}):
"{text}"
"#,
            category = scenario.category,
            text = scenario.text,
        )
    }
}

impl Planner for LlmPlanner {
    fn name(&self) -> &str {
        "llm"
    }

    fn plan(&self, scenario: &Scenario, registry: &ToolRegistry) -> Result<Plan, PlanningError> {
        let base = self.prompt(scenario, registry);
        let mut prompt = base.clone();
        let mut round = 0;
        loop {
            let plan = self.propose(&prompt, scenario)?;
            let errors = validate_plan(&plan, registry);
            if errors.is_empty() {
                return Ok(plan);
            }
            for error in &errors {
                let (hint, example) = error.hint();
                warn!(%error, hint = %hint, example = ?example, round, "generated plan rejected");
            }
            if round >= self.corrections {
                return Err(PlanningError::Invalid(errors));
            }
            round += 1;
            prompt = format!("{base}{}", Self::feedback(&errors));
        }
    }
}
