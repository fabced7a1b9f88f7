// src/protocol/mod.rs

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::{ToolInput, ToolResult};

pub mod llm;
pub mod planner;
pub mod playbooks;
pub mod summary;

pub type StepId = String;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern")
});

/// `(namespace, name)` pairs of every `{namespace.name}` placeholder in `text`.
/// The namespace is `scenario`, `context` or a step id.
pub fn placeholders(text: &str) -> Vec<(&str, &str)> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .collect()
}

/// Replaces each placeholder with whatever `lookup` returns for it.
pub fn render_template<F>(text: &str, mut lookup: F) -> Result<String, String>
where
    F: FnMut(&str, &str) -> Result<String, String>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(text) {
        let (Some(whole), Some(ns), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        out.push_str(&lookup(ns.as_str(), name.as_str())?);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Where a step input gets its value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    /// A constant baked into the plan.
    Literal(Value),
    /// A field of the scenario under resolution (`order_id`, `driver_id`, ...).
    Scenario(String),
    /// A key previously exported into the session context store.
    Context(String),
    /// A field of an earlier step's result.
    Step { step: StepId, field: String },
    /// Text with `{scenario.x}`, `{context.x}` or `{<step>.<field>}` placeholders.
    Template(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: StepId,
    pub action: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputSource>,
    /// Result fields copied into the session context store after the step.
    #[serde(default)]
    pub exports: Vec<String>,
}

impl PlanStep {
    pub fn new(id: &str, action: &str) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            inputs: BTreeMap::new(),
            exports: Vec::new(),
        }
    }

    pub fn input(mut self, name: &str, source: InputSource) -> Self {
        self.inputs.insert(name.into(), source);
        self
    }

    pub fn literal(self, name: &str, value: impl Into<Value>) -> Self {
        self.input(name, InputSource::Literal(value.into()))
    }

    pub fn scenario(self, name: &str, field: &str) -> Self {
        self.input(name, InputSource::Scenario(field.into()))
    }

    pub fn context(self, name: &str, key: &str) -> Self {
        self.input(name, InputSource::Context(key.into()))
    }

    pub fn from_step(self, name: &str, step: &str, field: &str) -> Self {
        self.input(
            name,
            InputSource::Step {
                step: step.into(),
                field: field.into(),
            },
        )
    }

    pub fn template(self, name: &str, text: &str) -> Self {
        self.input(name, InputSource::Template(text.into()))
    }

    pub fn export(mut self, field: &str) -> Self {
        self.exports.push(field.into());
        self
    }
}

/// How the final resolution text is produced from the trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryTemplate {
    Dispute,
    RecipientUnavailable,
    TrafficObstruction,
    MerchantOverloaded,
    /// Lists executed actions; used for plans built at run time.
    Generic,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    pub steps: Vec<PlanStep>,
    pub summary: SummaryTemplate,
}

impl Plan {
    pub fn new(name: &str, summary: SummaryTemplate) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            summary,
        }
    }

    pub fn step(mut self, step: PlanStep) -> Self {
        self.steps.push(step);
        self
    }
}

/// One executed step.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TraceEntry {
    pub step: StepId,
    pub action: String,
    pub resolved_inputs: ToolInput,
    pub result: ToolResult,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Ordered record of what a plan run actually did.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExecutionTrace {
    entries: Vec<TraceEntry>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn actions(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.action.as_str()).collect()
    }

    pub fn step(&self, id: &str) -> Option<&TraceEntry> {
        self.entries.iter().find(|e| e.step == id)
    }

    /// Result of the first step that ran `action`.
    pub fn result_of(&self, action: &str) -> Option<&ToolResult> {
        self.entries
            .iter()
            .find(|e| e.action == action)
            .map(|e| &e.result)
    }
}
