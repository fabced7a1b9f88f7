// src/validation/mod.rs

pub mod plan;

pub use plan::{PlanValidationError, ensure_valid, validate_plan};
