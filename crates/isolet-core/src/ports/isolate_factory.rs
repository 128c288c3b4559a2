//! IsolateFactory port - isolate の生成
//!
//! # 実装
//! - `ThreadIsolateFactory`: 1 isolate = 1 OS thread
//! - `TaskIsolateFactory`: 1 isolate = 1 Tokio task

use crate::app::isolate::IsolateHandle;

/// Instantiates one isolated execution context per call.
///
/// Contract:
/// - `spawn` returns immediately with an idle isolate; arguments arrive later
///   through `IsolateHandle::post`.
/// - The isolate resolves `computation` by name on its own side. An unknown
///   name is a runtime error, reported before any arguments are consumed.
/// - Exactly one outcome (or runtime error) is reported, followed by one exit.
///   Failures inside the isolate never propagate into the caller.
///
/// Implementations build the handle with `isolate::pair` and register a
/// terminator with `IsolateHandle::set_terminator`.
pub trait IsolateFactory: Send + Sync {
    fn spawn(&self, computation: &str) -> IsolateHandle;

    /// Short label for logs ("thread", "task", ...).
    fn kind(&self) -> &'static str;
}
