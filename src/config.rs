// src/config.rs

//! Resolver configuration.
//!
//! Every section has defaults, so an empty (or absent) TOML file yields a
//! working scripted resolver.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Upper bound on `simulation.latency_scale`.
pub const MAX_LATENCY_SCALE: f64 = 1000.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub planner: PlannerMode,
    pub retry: RetryConfig,
    pub timeouts: TimeoutConfig,
    pub simulation: SimulationConfig,
    pub scenario_defaults: ScenarioDefaults,
    pub llm: LlmConfig,
}

/// Which planner turns a classified scenario into a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerMode {
    /// Fixed playbooks, one per scenario category.
    #[default]
    Scripted,
    /// Plans generated by a language model. Best-effort.
    Llm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff_ms: 100,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.backoff_ms == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64 << (attempt - 1).min(16);
        let delay = self.backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub step_timeout_ms: u64,
    pub resolution_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 5_000,
            resolution_timeout_ms: 60_000,
        }
    }
}

impl TimeoutConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn resolution_timeout(&self) -> Duration {
        Duration::from_millis(self.resolution_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixes stub randomness. `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Multiplier on the stubs' base latency. 0 disables the delay.
    pub latency_scale: f64,
    /// Probability that a stub call fails with a retryable transport error.
    pub transient_failure_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            latency_scale: 1.0,
            transient_failure_rate: 0.0,
        }
    }
}

/// Identifiers used when the scenario text does not mention them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioDefaults {
    pub order_id: String,
    pub customer_id: String,
    pub driver_id: String,
    pub merchant_id: String,
    pub destination: String,
    pub flight_number: String,
}

impl Default for ScenarioDefaults {
    fn default() -> Self {
        Self {
            order_id: "order-789".into(),
            customer_id: "cust-456".into(),
            driver_id: "driver-123".into(),
            merchant_id: "merchant-001".into(),
            destination: "customer drop-off address".into(),
            flight_number: "MH123".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding a bearer token, if the endpoint needs one.
    pub api_key_env: Option<String>,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api/generate".into(),
            model: "llama3".into(),
            api_key_env: None,
            timeout_ms: 60_000,
        }
    }
}

impl LlmConfig {
    /// Looks up the configured credential through `lookup` (normally
    /// `std::env::var`). A named but unset variable is a configuration error.
    pub fn resolve_api_key<F>(&self, lookup: F) -> Result<Option<String>, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match &self.api_key_env {
            None => Ok(None),
            Some(var) => match lookup(var) {
                Some(key) if !key.trim().is_empty() => Ok(Some(key)),
                _ => Err(ConfigurationError::MissingCredentials { var: var.clone() }),
            },
        }
    }
}

impl Config {
    /// Reads `path` if given, otherwise returns defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&raw).map_err(|source| ConfigurationError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigurationError> {
        let config: Config = toml::from_str(raw)
            .map_err(|e| ConfigurationError::invalid(format!("bad TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.retry.max_retries > 10 {
            return Err(ConfigurationError::invalid(
                "retry.max_retries must be at most 10",
            ));
        }
        if self.timeouts.step_timeout_ms == 0 || self.timeouts.resolution_timeout_ms == 0 {
            return Err(ConfigurationError::invalid("timeouts must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.simulation.transient_failure_rate) {
            return Err(ConfigurationError::invalid(
                "simulation.transient_failure_rate must be within [0, 1]",
            ));
        }
        if !(0.0..=MAX_LATENCY_SCALE).contains(&self.simulation.latency_scale) {
            return Err(ConfigurationError::invalid(format!(
                "simulation.latency_scale must be within [0, {MAX_LATENCY_SCALE}]"
            )));
        }
        if self.planner == PlannerMode::Llm
            && (self.llm.endpoint.trim().is_empty() || self.llm.model.trim().is_empty())
        {
            return Err(ConfigurationError::invalid(
                "llm.endpoint and llm.model are required for the llm planner",
            ));
        }
        Ok(())
    }
}
