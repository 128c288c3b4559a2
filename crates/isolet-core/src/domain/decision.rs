//! Decision model: what to do after an attempt.
//!
//! `RetryState` is scoped to one invocation. It is a pure state machine: the
//! pool loop feeds it each `AttemptResult` and performs whatever it decides.

use std::time::Duration;

use serde_json::Value;

use super::errors::PoolError;
use super::outcome::AttemptResult;

/// The next action for an invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Settle the deferred result with this value.
    Resolve(Value),

    /// Wait `delay`, then spawn attempt number `retry + 1`.
    Retry { delay: Duration, retry: usize },

    /// Settle the deferred result with this error.
    Reject(PoolError),
}

/// Retry bookkeeping for one invocation.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Retries already scheduled (0-based, never above `delays.len()`).
    pub retry_count: usize,

    /// Most recent recorded failure (outcome error or runtime error).
    pub last_error: Option<PoolError>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide the next action for `result` given the configured backoff.
    ///
    /// Cancellation never retries. Failures retry while `retry_count < delays.len()`,
    /// otherwise reject with the last recorded error, falling back to the exit code.
    pub fn decide(&mut self, result: AttemptResult, delays: &[Duration]) -> Decision {
        match result {
            AttemptResult::Succeeded(value) => Decision::Resolve(value),
            AttemptResult::Cancelled { .. } => Decision::Reject(PoolError::Cancelled),
            AttemptResult::Failed { error, exit } => {
                if let Some(error) = error {
                    self.last_error = Some(error);
                }

                if let Some(&delay) = delays.get(self.retry_count) {
                    self.retry_count += 1;
                    Decision::Retry {
                        delay,
                        retry: self.retry_count,
                    }
                } else {
                    let error = self
                        .last_error
                        .take()
                        .unwrap_or(PoolError::Stopped { code: exit.code });
                    Decision::Reject(error)
                }
            }
        }
    }
}
