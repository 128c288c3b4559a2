//! Outcome model: the terminal result of one isolate run.
//!
//! `Outcome` is what the isolate reports over its message channel.
//! `AttemptResult` is what the caller side derives once the isolate has exited,
//! combining the recorded outcome with the exit signal.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::{ComputationError, PoolError};
use super::state::{Exit, ExitCause};

/// The single message an isolate sends back.
///
/// Serialized as `{"status":"success","value":..}` or `{"status":"error","error":{..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { value: Value },
    Error { error: ComputationError },
}

impl Outcome {
    pub fn success(value: Value) -> Self {
        Self::Success { value }
    }

    pub fn error(error: impl Into<ComputationError>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Exit code the isolate reports after delivering this outcome.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn into_result(self) -> Result<Value, PoolError> {
        match self {
            Self::Success { value } => Ok(value),
            Self::Error { error } => Err(PoolError::Computation(error)),
        }
    }
}

/// Result of one attempt, known once the isolate has exited.
///
/// Running → {Succeeded, Failed, Cancelled} → (retry | settle)
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptResult {
    Succeeded(Value),

    /// `error` is the recorded outcome/runtime error, if any.
    /// Timeouts and explicit terminations carry no error, only the exit.
    Failed {
        error: Option<PoolError>,
        exit: Exit,
    },

    Cancelled { exit: Exit },
}

impl AttemptResult {
    /// Fold the first recorded result and the exit signal into one variant.
    pub fn from_exit(exit: Exit, recorded: Option<Result<Value, PoolError>>) -> Self {
        match (exit.code, recorded) {
            (0, Some(Ok(value))) => Self::Succeeded(value),
            _ if exit.cause == ExitCause::Cancelled => Self::Cancelled { exit },
            (_, recorded) => Self::Failed {
                error: recorded.and_then(Result::err),
                exit,
            },
        }
    }

    pub fn exit(&self) -> Option<Exit> {
        match self {
            Self::Succeeded(_) => None,
            Self::Failed { exit, .. } | Self::Cancelled { exit } => Some(*exit),
        }
    }
}
