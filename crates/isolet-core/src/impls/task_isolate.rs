//! TaskIsolateFactory - 1 isolate = 1 Tokio task
//!
//! Runs the isolate on the caller's runtime. Termination aborts the task at
//! its next await point. Memory is not separated from the caller; state is
//! still only exchanged through the port (plain-data arguments and outcome).

use std::sync::Arc;

use tokio::runtime::Handle;

use super::run_isolate;
use crate::app::isolate::{self, IsolateHandle};
use crate::ports::IsolateFactory;
use crate::typed::ComputationRegistry;

pub struct TaskIsolateFactory {
    registry: Arc<ComputationRegistry>,
}

impl TaskIsolateFactory {
    pub fn new(registry: Arc<ComputationRegistry>) -> Self {
        Self { registry }
    }
}

impl IsolateFactory for TaskIsolateFactory {
    fn spawn(&self, computation: &str) -> IsolateHandle {
        let (handle, port) = isolate::pair(computation);

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                port.crash(format!("task isolate needs a tokio runtime: {e}"));
                return handle;
            }
        };

        let task = runtime.spawn(run_isolate(port, Arc::clone(&self.registry)));
        let abort = task.abort_handle();
        handle.set_terminator(move || abort.abort());

        tracing::debug!(isolate = %handle.id(), computation, kind = self.kind(), "isolate spawned");
        handle
    }

    fn kind(&self) -> &'static str {
        "task"
    }
}
