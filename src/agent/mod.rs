// src/agent/mod.rs

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::ResolutionError;
use crate::model::ScenarioCategory;
use crate::protocol::ExecutionTrace;

pub mod coordinator;

pub use coordinator::{Coordinator, CoordinatorBuilder};

/// Anything that can take a disruption report and resolve it end to end.
pub trait Agent: Send + Sync {
    fn resolve(&self, scenario_text: &str) -> Result<Resolution, ResolutionError>;
}

/// A successful resolution. Never partially filled: failures come back as
/// [`ResolutionError`] instead.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub case_id: String,
    pub input: String,
    pub output: String,
    pub category: ScenarioCategory,
    /// Name of the planner that produced the plan.
    pub planner: String,
    pub trace: ExecutionTrace,
    /// Final contents of the case's context session.
    pub context: BTreeMap<String, Value>,
}
