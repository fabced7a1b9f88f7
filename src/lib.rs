// src/lib.rs

//! Disruption resolver for last-mile delivery.
//!
//! A free-text report is classified, turned into a plan of domain actions,
//! executed step by step and summarized. [`agent::Coordinator`] is the entry
//! point.

pub mod agent;
pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod memory;
pub mod model;
pub mod protocol;
pub mod tools;
pub mod validation;

pub use agent::{Agent, Coordinator, Resolution};
pub use config::Config;
pub use error::ResolutionError;
