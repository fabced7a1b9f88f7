// src/tools/simulate.rs

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::config::SimulationConfig;
use crate::context::RuntimeContext;
use crate::error::DomainActionError;
use crate::tools::ToolInput;

const SLICE: Duration = Duration::from_millis(10);

/// Shared knobs for the simulated backends.
///
/// Holds no mutable state: each call derives its own RNG, so stubs stay safe
/// to run concurrently and reproducible under a fixed seed.
#[derive(Debug, Clone)]
pub struct Simulation {
    seed: Option<u64>,
    latency_scale: f64,
    transient_failure_rate: f64,
}

impl Simulation {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            seed: config.seed,
            latency_scale: config.latency_scale.max(0.0),
            transient_failure_rate: config.transient_failure_rate.clamp(0.0, 1.0),
        }
    }

    /// Seeded, zero-latency, failure-free simulation.
    pub fn instant(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            latency_scale: 0.0,
            transient_failure_rate: 0.0,
        }
    }

    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.transient_failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// RNG for one call. Seeded runs depend only on the seed, the action,
    /// its input and the attempt number.
    pub fn rng(&self, ctx: &RuntimeContext, action: &str, input: &ToolInput) -> StdRng {
        match self.seed {
            Some(seed) => {
                let mut hasher = DefaultHasher::new();
                seed.hash(&mut hasher);
                action.hash(&mut hasher);
                serde_json::Value::Object(input.clone()).to_string().hash(&mut hasher);
                ctx.attempt.hash(&mut hasher);
                StdRng::seed_from_u64(hasher.finish())
            }
            None => StdRng::from_entropy(),
        }
    }

    /// Runs the common prologue of a simulated backend call: the network
    /// delay, then a possible transient transport failure.
    pub fn call(
        &self,
        ctx: &RuntimeContext,
        action: &str,
        base_latency: Duration,
        rng: &mut StdRng,
    ) -> Result<(), DomainActionError> {
        self.latency(ctx, action, base_latency)?;
        if self.transient_failure_rate > 0.0 && rng.gen_bool(self.transient_failure_rate) {
            warn!(action, attempt = ctx.attempt, "simulated transport failure");
            return Err(DomainActionError::retryable(action, "simulated transport failure"));
        }
        Ok(())
    }

    /// Sleeps for the scaled latency in short slices, giving up as soon as
    /// the context is cancelled or its deadline passes.
    pub fn latency(
        &self,
        ctx: &RuntimeContext,
        action: &str,
        base: Duration,
    ) -> Result<(), DomainActionError> {
        let total = Duration::try_from_secs_f64(base.as_secs_f64() * self.latency_scale)
            .map_err(|_| DomainActionError::fatal(action, "simulated latency out of range"))?;
        let until = Instant::now()
            .checked_add(total)
            .ok_or_else(|| DomainActionError::fatal(action, "simulated latency out of range"))?;
        loop {
            if ctx.is_cancelled() {
                return Err(DomainActionError::cancelled(action));
            }
            if ctx.is_expired() {
                return Err(DomainActionError::timed_out(action));
            }
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            let mut nap = (until - now).min(SLICE);
            if let Some(left) = ctx.remaining() {
                nap = nap.min(left);
            }
            thread::sleep(nap);
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}
