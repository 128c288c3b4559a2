//! Ports - 抽象化レイヤー
//!
//! The seams the pool talks through. Implementations live in `impls`
//! (isolate factories) or are supplied by the caller (loggers, custom factories).

pub mod isolate_factory;
pub mod logger;

pub use self::isolate_factory::IsolateFactory;
pub use self::logger::{ProgressLogger, TracingLogger};
