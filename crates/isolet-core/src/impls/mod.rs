//! Impls - isolate factory 実装
//!
//! Both factories run the same isolate body (`run_isolate`); they differ only
//! in where that body executes and how it is killed.

pub mod task_isolate;
pub mod thread_isolate;

pub use self::task_isolate::TaskIsolateFactory;
pub use self::thread_isolate::ThreadIsolateFactory;

use std::any::Any;
use std::sync::Arc;

use tokio::task::AbortHandle;

use crate::app::isolate::IsolatePort;
use crate::domain::Outcome;
use crate::typed::{ComputationRegistry, Fault};

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Isolate body: resolve the computation, wait for arguments, run, report.
///
/// The computation runs in its own task so a panic is captured as a runtime
/// error instead of unwinding through the isolate.
pub(crate) async fn run_isolate(mut port: IsolatePort, registry: Arc<ComputationRegistry>) {
    let Some(computation) = registry.get(port.computation()) else {
        let message = format!("computation '{}' is not registered", port.computation());
        port.crash(message);
        return;
    };

    let Some(arguments) = port.arguments().await else {
        // terminated before the start delay elapsed
        return;
    };

    tracing::trace!(isolate = %port.id(), computation = computation.name(), "isolate started");

    let task = tokio::spawn(async move { computation.invoke(arguments).await });
    let _guard = AbortOnDrop(task.abort_handle());

    match task.await {
        Ok(Ok(value)) => port.complete(Outcome::success(value)),
        Ok(Err(Fault::Failed(error))) => port.complete(Outcome::error(error)),
        Ok(Err(Fault::Malformed(message))) => port.crash(message),
        Err(join) if join.is_panic() => {
            let message = panic_message(join.into_panic());
            port.crash(format!("computation panicked: {message}"));
        }
        Err(join) => port.crash(join.to_string()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
