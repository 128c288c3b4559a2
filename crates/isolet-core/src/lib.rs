//! isolet-core
//!
//! Run registered computations in isolated execution contexts ("isolates"),
//! with optional start delay, timeout, external cancellation and bounded
//! retry with backoff.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, outcome, lifecycle, options, decision, errors）
//! - **typed**: 型付き Computation API（Computation, ComputationRegistry, TypedPool）
//! - **ports**: 抽象化レイヤー（IsolateFactory, ProgressLogger）
//! - **impls**: isolate factory 実装（thread / task）
//! - **app**: IsolateHandle, `create_worker`, `create_pool`
//! - **env**: composition root 用の factory 選択
//!
//! # 使用例
//! ```ignore
//! let mut registry = ComputationRegistry::new();
//! registry.register(Add)?;
//! let factory = IsolateKind::from_env()?.factory(Arc::new(registry));
//!
//! let pool = create_pool(factory, Add::NAME, ExecutionOptions::new()
//!     .with_retry_delays([Duration::from_millis(10), Duration::from_millis(20)]));
//! let five = pool.call(vec![json!(2), json!(3)]).await?;
//! ```

pub mod app;
pub mod domain;
pub mod env;
pub mod impls;
pub mod ports;
pub mod typed;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{
    Deferred, InvocationReport, IsolateEvent, IsolateHandle, IsolatePort, Pool, create_pool,
    create_worker,
};
pub use domain::{
    AttemptRecord, AttemptResult, CancellationSignal, ComputationError, ExecutionOptions, Exit,
    ExitCause, Lifecycle, Outcome, PoolError,
};
pub use env::IsolateKind;
pub use impls::{TaskIsolateFactory, ThreadIsolateFactory};
pub use ports::{IsolateFactory, ProgressLogger, TracingLogger};
pub use typed::{Computation, ComputationRegistry, TypedPool, create_typed_pool};
