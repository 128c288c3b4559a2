//! ProgressLogger port - 進捗通知の出力先

/// Sink for human-readable progress notices.
///
/// Only retry announcements go through here; everything else is emitted as
/// `tracing` events by the library itself.
pub trait ProgressLogger: Send + Sync {
    fn notice(&self, message: &str);
}

/// Default logger: forwards notices to `tracing` at WARN level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl ProgressLogger for TracingLogger {
    fn notice(&self, message: &str) {
        tracing::warn!(target: "isolet::retry", "{message}");
    }
}
