//! ThreadIsolateFactory - 1 isolate = 1 OS thread
//!
//! Each isolate gets a dedicated thread with its own current-thread Tokio
//! runtime, so a busy computation never stalls the caller's runtime.
//!
//! Termination is immediate at the handle: the exit is emitted and any later
//! result is discarded. The thread itself stops at the computation's next
//! await point; a computation that never yields keeps its thread until it
//! returns.

use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;

use super::run_isolate;
use crate::app::isolate::{self, IsolateHandle};
use crate::ports::IsolateFactory;
use crate::typed::ComputationRegistry;

pub struct ThreadIsolateFactory {
    registry: Arc<ComputationRegistry>,
    stack_size: Option<usize>,
}

impl ThreadIsolateFactory {
    pub fn new(registry: Arc<ComputationRegistry>) -> Self {
        Self {
            registry,
            stack_size: None,
        }
    }

    /// Stack size for isolate threads (platform default otherwise).
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl IsolateFactory for ThreadIsolateFactory {
    fn spawn(&self, computation: &str) -> IsolateHandle {
        let (handle, port) = isolate::pair(computation);

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        handle.set_terminator(move || {
            let _ = kill_tx.send(());
        });

        let registry = Arc::clone(&self.registry);
        let mut builder = thread::Builder::new().name(format!("isolet-{}", handle.id()));
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }

        // if spawn fails the closure (and the port inside it) is dropped,
        // which reports a runtime error on the handle
        let spawned = builder.spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    port.crash(format!("isolate runtime: {e}"));
                    return;
                }
            };

            runtime.block_on(async move {
                tokio::select! {
                    _ = kill_rx => {}
                    _ = run_isolate(port, registry) => {}
                }
            });
        });

        match spawned {
            Ok(_) => {
                tracing::debug!(
                    isolate = %handle.id(),
                    computation,
                    kind = self.kind(),
                    "isolate spawned"
                );
            }
            Err(e) => {
                tracing::warn!(
                    isolate = %handle.id(),
                    computation,
                    error = %e,
                    "isolate thread spawn failed"
                );
            }
        }
        handle
    }

    fn kind(&self) -> &'static str {
        "thread"
    }
}
