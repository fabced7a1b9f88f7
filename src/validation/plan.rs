// src/validation/plan.rs

use std::collections::HashSet;

use serde_json::{Value, json};
use thiserror::Error;

use crate::error::ConfigurationError;
use crate::model::SCENARIO_FIELDS;
use crate::protocol::{InputSource, Plan, PlanStep, placeholders};
use crate::tools::ToolRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanValidationError {
    #[error("plan has no steps")]
    EmptyPlan,
    #[error("step id '{0}' is used more than once")]
    DuplicateStepId(String),
    #[error("step '{step}' uses unregistered action '{action}'")]
    UnknownAction { step: String, action: String },
    #[error("step '{step}' does not supply required input '{input}'")]
    MissingInput { step: String, input: String },
    #[error("step '{step}' supplies input '{input}' that its action does not declare")]
    UndeclaredInput { step: String, input: String },
    #[error("step '{step}' references step '{source_step}' which does not run before it")]
    InvalidReference { step: String, source_step: String },
    #[error("step '{step}' reads field '{field}' that step '{source_step}' does not produce")]
    UnknownField {
        step: String,
        source_step: String,
        field: String,
    },
    #[error("step '{step}' reads unknown scenario field '{field}'")]
    UnknownScenarioField { step: String, field: String },
    #[error("step '{step}' reads context key '{key}' that no earlier step exports")]
    UnknownContextKey { step: String, key: String },
    #[error("step '{step}' exports field '{field}' that its action does not produce")]
    InvalidExport { step: String, field: String },
}

impl PlanValidationError {
    /// Short message plus an optional corrective example, for feeding back
    /// to a planner that produced the plan.
    pub fn hint(&self) -> (String, Option<Value>) {
        match self {
            PlanValidationError::EmptyPlan => ("A plan needs at least one step.".to_string(), None),
            PlanValidationError::DuplicateStepId(id) => (
                "Step ids must be unique.".to_string(),
                Some(json!({ "id": format!("{id}_2") })),
            ),
            PlanValidationError::UnknownAction { action, .. } => (
                "Unknown action used. Pick one from the catalogue.".to_string(),
                Some(json!({ "action": action })),
            ),
            PlanValidationError::MissingInput { input, .. } => (
                "Missing required input.".to_string(),
                Some(json!({ input.clone(): { "scenario": "<field>" } })),
            ),
            PlanValidationError::UndeclaredInput { input, .. } => (
                "Input is not part of the action's schema.".to_string(),
                Some(json!({ "remove": input })),
            ),
            PlanValidationError::InvalidReference { source_step, .. } => (
                "Reference to output of a step that has not run yet.".to_string(),
                Some(json!({ "reference": source_step })),
            ),
            PlanValidationError::UnknownField { field, .. } => (
                "Referenced result field is not produced by that action.".to_string(),
                Some(json!({ "field": field })),
            ),
            PlanValidationError::UnknownScenarioField { .. } => (
                "Unknown scenario field.".to_string(),
                Some(json!({ "allowed": SCENARIO_FIELDS })),
            ),
            PlanValidationError::UnknownContextKey { key, .. } => (
                "Context keys must be exported by an earlier step.".to_string(),
                Some(json!({ "exports": [key] })),
            ),
            PlanValidationError::InvalidExport { field, .. } => (
                "Only fields the action produces can be exported.".to_string(),
                Some(json!({ "field": field })),
            ),
        }
    }
}

/// Checks a plan against the registry: every reference must point backwards
/// at something that will exist when the step runs.
pub fn validate_plan(plan: &Plan, registry: &ToolRegistry) -> Vec<PlanValidationError> {
    let mut errors = Vec::new();
    if plan.steps.is_empty() {
        errors.push(PlanValidationError::EmptyPlan);
        return errors;
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut exported: HashSet<&str> = HashSet::new();

    for step in &plan.steps {
        if !seen_ids.insert(step.id.as_str()) {
            errors.push(PlanValidationError::DuplicateStepId(step.id.clone()));
        }

        match registry.spec(&step.action) {
            Ok(spec) => {
                for required in spec.required_inputs() {
                    if !step.inputs.contains_key(required) {
                        errors.push(PlanValidationError::MissingInput {
                            step: step.id.clone(),
                            input: required.to_string(),
                        });
                    }
                }
                for name in step.inputs.keys() {
                    if !spec.declares_input(name) {
                        errors.push(PlanValidationError::UndeclaredInput {
                            step: step.id.clone(),
                            input: name.clone(),
                        });
                    }
                }
                for field in &step.exports {
                    if !spec.produces(field) {
                        errors.push(PlanValidationError::InvalidExport {
                            step: step.id.clone(),
                            field: field.clone(),
                        });
                    }
                }
            }
            Err(_) => errors.push(PlanValidationError::UnknownAction {
                step: step.id.clone(),
                action: step.action.clone(),
            }),
        }

        for source in step.inputs.values() {
            check_source(plan, step, source, &exported, registry, &mut errors);
        }

        // Exports become visible to later steps only.
        exported.extend(step.exports.iter().map(String::as_str));
    }

    errors
}

/// [`validate_plan`] as a startup check.
pub fn ensure_valid(plan: &Plan, registry: &ToolRegistry) -> Result<(), ConfigurationError> {
    let errors = validate_plan(plan, registry);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidPlan {
            plan: plan.name.clone(),
            errors,
        })
    }
}

fn check_source(
    plan: &Plan,
    step: &PlanStep,
    source: &InputSource,
    exported: &HashSet<&str>,
    registry: &ToolRegistry,
    errors: &mut Vec<PlanValidationError>,
) {
    match source {
        InputSource::Literal(_) => {}
        InputSource::Scenario(field) => check_scenario(step, field, errors),
        InputSource::Context(key) => check_context(step, key, exported, errors),
        InputSource::Step {
            step: source_step,
            field,
        } => check_step_ref(plan, step, source_step, field, registry, errors),
        InputSource::Template(text) => {
            for (namespace, name) in placeholders(text) {
                match namespace {
                    "scenario" => check_scenario(step, name, errors),
                    "context" => check_context(step, name, exported, errors),
                    source_step => check_step_ref(plan, step, source_step, name, registry, errors),
                }
            }
        }
    }
}

fn check_scenario(step: &PlanStep, field: &str, errors: &mut Vec<PlanValidationError>) {
    if !SCENARIO_FIELDS.contains(&field) {
        errors.push(PlanValidationError::UnknownScenarioField {
            step: step.id.clone(),
            field: field.to_string(),
        });
    }
}

fn check_context(
    step: &PlanStep,
    key: &str,
    exported: &HashSet<&str>,
    errors: &mut Vec<PlanValidationError>,
) {
    if !exported.contains(key) {
        errors.push(PlanValidationError::UnknownContextKey {
            step: step.id.clone(),
            key: key.to_string(),
        });
    }
}

fn check_step_ref(
    plan: &Plan,
    step: &PlanStep,
    source_step: &str,
    field: &str,
    registry: &ToolRegistry,
    errors: &mut Vec<PlanValidationError>,
) {
    let position = |id: &str| plan.steps.iter().position(|s| s.id == id);
    let earlier = match (position(source_step), position(&step.id)) {
        (Some(src), Some(cur)) if src < cur => plan.steps.get(src),
        _ => None,
    };
    let Some(source) = earlier else {
        errors.push(PlanValidationError::InvalidReference {
            step: step.id.clone(),
            source_step: source_step.to_string(),
        });
        return;
    };
    // An unknown source action is already reported on its own step.
    if let Ok(spec) = registry.spec(&source.action) {
        if !spec.produces(field) {
            errors.push(PlanValidationError::UnknownField {
                step: step.id.clone(),
                source_step: source_step.to_string(),
                field: field.to_string(),
            });
        }
    }
}
