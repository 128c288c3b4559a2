//! Attempt history for one invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::IsolateId;
use super::outcome::AttemptResult;
use super::state::ExitCause;

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

/// A single isolate run within an invocation.
///
/// Records which isolate ran, when, and how it ended. Enough to explain
/// "why did this call take three isolates".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt: usize,
    pub isolate_id: IsolateId,
    pub status: AttemptStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn new(
        attempt: usize,
        isolate_id: IsolateId,
        result: &AttemptResult,
        started_at: DateTime<Utc>,
    ) -> Self {
        let (status, error) = match result {
            AttemptResult::Succeeded(_) => (AttemptStatus::Succeeded, None),
            AttemptResult::Cancelled { .. } => (AttemptStatus::Cancelled, None),
            AttemptResult::Failed { error, exit } => {
                let status = if exit.cause == ExitCause::TimedOut {
                    AttemptStatus::TimedOut
                } else {
                    AttemptStatus::Failed
                };
                (status, error.as_ref().map(ToString::to_string))
            }
        };

        Self {
            attempt,
            isolate_id,
            status,
            exit_code: result.exit().map(|exit| exit.code),
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
