//! App - アプリケーション層
//!
//! # 主要コンポーネント
//! - **isolate**: IsolateHandle / IsolatePort（1 isolate のライフサイクル）
//! - **scheduler**: `create_worker`（start delay, timeout, cancellation）
//! - **pool**: `create_pool`（retry with backoff, Deferred）

pub mod isolate;
pub mod pool;
pub mod scheduler;

pub use self::isolate::{IsolateEvent, IsolateHandle, IsolatePort};
pub use self::pool::{Deferred, InvocationReport, Pool, create_pool};
pub use self::scheduler::create_worker;
