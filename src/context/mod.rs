// src/context/mod.rs

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Per-resolution runtime context handed to every tool call.
///
/// Carries the case id, the caller's cancellation token and a deadline. The
/// executor derives a child per step (and per attempt) with a tighter deadline.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    pub case_id: String,
    pub cancellation: CancellationToken,
    pub deadline: Option<Instant>,
    /// 0 on the first call of a step, incremented on each retry.
    pub attempt: u32,
}

impl RuntimeContext {
    pub fn new(case_id: &str) -> Self {
        Self {
            case_id: case_id.to_string(),
            cancellation: CancellationToken::new(),
            deadline: None,
            attempt: 0,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(earliest(self.deadline, deadline));
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Context for one attempt of one step: same case and token, deadline
    /// capped by `step_timeout`.
    pub fn for_step(&self, step_timeout: Duration, attempt: u32) -> Self {
        Self {
            case_id: self.case_id.clone(),
            cancellation: self.cancellation.clone(),
            deadline: Some(earliest(self.deadline, Instant::now() + step_timeout)),
            attempt,
        }
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left before the deadline; `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

fn earliest(current: Option<Instant>, candidate: Instant) -> Instant {
    match current {
        Some(existing) if existing < candidate => existing,
        _ => candidate,
    }
}
