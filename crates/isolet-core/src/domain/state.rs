//! Isolate lifecycle and exit signal.

use serde::{Deserialize, Serialize};

/// Exit code used for every forced termination (timeout, cancellation, terminate()).
pub const TERMINATED_EXIT_CODE: i32 = 1;

/// Why an isolate stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitCause {
    /// The isolate reported an outcome (or crashed) and ended on its own.
    Completed,
    /// The timeout elapsed first.
    TimedOut,
    /// The cancellation signal fired.
    Cancelled,
    /// `terminate()` was called, or the handle was dropped.
    Terminated,
}

/// Synthetic exit signal: one per isolate run.
///
/// `code == 0` only for a completed run whose outcome was a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    pub code: i32,
    pub cause: ExitCause,
}

impl Exit {
    pub fn completed(code: i32) -> Self {
        Self {
            code,
            cause: ExitCause::Completed,
        }
    }

    pub fn terminated(cause: ExitCause) -> Self {
        Self {
            code: TERMINATED_EXIT_CODE,
            cause,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.code == 0
    }
}

/// Lifecycle of one isolate.
///
/// ```text
/// Idle ──post()──▶ Running ──▶ Exited(exit)
///   └───────── terminate() ──────▲
/// ```
/// `Exited` is terminal: nothing is reported after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Spawned, waiting for its arguments.
    Idle,
    Running,
    Exited(Exit),
}

impl Lifecycle {
    pub fn is_exited(&self) -> bool {
        matches!(self, Self::Exited(_))
    }

    pub fn exit(&self) -> Option<Exit> {
        match self {
            Self::Exited(exit) => Some(*exit),
            _ => None,
        }
    }
}
