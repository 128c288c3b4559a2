//! Execution options: start delay, timeout, retry backoff, cancellation, logger.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::cancel::CancellationSignal;
use crate::ports::ProgressLogger;

/// Options applied to every attempt of a pool (or to one `create_worker` run).
///
/// # 使用例
/// ```ignore
/// let options = ExecutionOptions::new()
///     .with_timeout(Duration::from_secs(5))
///     .with_retry_delays([Duration::from_millis(10), Duration::from_millis(20)]);
/// ```
#[derive(Clone, Default)]
pub struct ExecutionOptions {
    /// Hold back argument delivery this long after spawn.
    pub start_delay: Option<Duration>,

    /// Wall-clock budget measured from spawn.
    pub timeout: Option<Duration>,

    /// Backoff before each retry. `retry_delays.len()` is the max retry count.
    pub retry_delays: Vec<Duration>,

    pub cancellation: Option<CancellationSignal>,

    /// Receives retry notices. Defaults to `TracingLogger`.
    pub logger: Option<Arc<dyn ProgressLogger>>,
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = Some(delay);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_delays(mut self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.retry_delays = delays.into_iter().collect();
        self
    }

    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = Some(signal);
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ProgressLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn max_retries(&self) -> usize {
        self.retry_delays.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationSignal::is_cancelled)
    }

    /// Build options from a JSON config object. Unknown keys are ignored.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let config = OptionsConfig::deserialize(value)?;
        Ok(config.into())
    }
}

impl fmt::Debug for ExecutionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionOptions")
            .field("start_delay", &self.start_delay)
            .field("timeout", &self.timeout)
            .field("retry_delays", &self.retry_delays)
            .field("cancellation", &self.cancellation.is_some())
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

/// Serializable part of `ExecutionOptions` (all durations in milliseconds).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_delay_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retry_delays_ms: Vec<u64>,
}

impl From<OptionsConfig> for ExecutionOptions {
    fn from(config: OptionsConfig) -> Self {
        Self {
            start_delay: config.start_delay_ms.map(Duration::from_millis),
            timeout: config.timeout_ms.map(Duration::from_millis),
            retry_delays: config
                .retry_delays_ms
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
            cancellation: None,
            logger: None,
        }
    }
}
