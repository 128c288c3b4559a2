//! Errors - エラー型と分類
//!
//! - `ComputationError`: computation 自身が返す失敗（isolate 境界を越える plain data）
//! - `PoolError`: 呼び出し側に見えるエラー（最終的な reject 理由）

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure raised by a computation inside its isolate.
///
/// This is plain data so it can cross the isolate boundary unchanged.
/// `Display` is the bare message, matching what the computation reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ComputationError {
    pub message: String,

    /// Optional structured detail (error code, offending input, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ComputationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl From<String> for ComputationError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ComputationError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Error surfaced by a pool invocation or a single isolate attempt.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoolError {
    /// The computation failed (returned an error) inside the isolate.
    #[error(transparent)]
    Computation(ComputationError),

    /// The isolate itself failed outside the computation's error channel
    /// (unknown computation, undecodable arguments, panic, spawn failure).
    #[error("isolate runtime error: {0}")]
    Runtime(String),

    /// The isolate was stopped without producing an outcome (e.g. timeout).
    #[error("isolate stopped with exit code {code}")]
    Stopped { code: i32 },

    /// The cancellation signal fired.
    #[error("execution cancelled")]
    Cancelled,

    /// Arguments could not be turned into positional plain-data values.
    #[error("invalid arguments: {0}")]
    Arguments(String),

    /// The isolate's value could not be decoded into the expected output type.
    #[error("result decode: {0}")]
    Decode(String),
}

impl From<ComputationError> for PoolError {
    fn from(error: ComputationError) -> Self {
        Self::Computation(error)
    }
}
