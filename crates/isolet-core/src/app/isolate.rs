//! Isolate handle - one running isolate, seen from both sides.
//!
//! `pair()` creates the two halves:
//! - `IsolateHandle` (caller side): events, `post()`, `terminate()`.
//! - `IsolatePort` (isolate side): receives arguments, reports exactly one result.
//!
//! Every transition goes through the `watch::Sender<Lifecycle>` lock, so the
//! first of {report, terminate} wins and nothing is emitted after `Exited`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::domain::{AttemptResult, Exit, ExitCause, IsolateId, Lifecycle, Outcome, PoolError};

/// What the caller observes from an isolate.
///
/// Per run: at most one of `Outcome`/`RuntimeError`, then exactly one `Terminated`.
#[derive(Debug, Clone, PartialEq)]
pub enum IsolateEvent {
    Outcome(Outcome),
    /// The isolate failed outside the computation's own error channel.
    RuntimeError(String),
    Terminated(Exit),
}

type Terminator = Box<dyn FnOnce() + Send>;

struct Shared {
    id: IsolateId,
    computation: String,
    lifecycle: watch::Sender<Lifecycle>,
    events: mpsc::UnboundedSender<IsolateEvent>,
    arguments: Mutex<Option<oneshot::Sender<Vec<Value>>>>,
    terminator: Mutex<Option<Terminator>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    /// Delivery and the `Idle -> Running` transition happen under the
    /// lifecycle lock, so a concurrent `terminate` either sees `Running` or
    /// wins and the arguments are never sent.
    fn post(&self, arguments: Vec<Value>) -> bool {
        let mut slot = lock(&self.arguments);
        self.lifecycle.send_if_modified(|state| {
            if *state != Lifecycle::Idle {
                return false;
            }
            let Some(tx) = slot.take() else {
                return false;
            };
            if tx.send(arguments).is_err() {
                return false;
            }
            *state = Lifecycle::Running;
            true
        })
    }

    /// The isolate ended on its own: emit its report, then the exit.
    fn finish(&self, report: IsolateEvent, code: i32) {
        let exited = self.lifecycle.send_if_modified(|state| {
            if state.is_exited() {
                return false;
            }
            let exit = Exit::completed(code);
            // receiver lives in the handle; a dropped handle means nobody cares
            let _ = self.events.send(report);
            let _ = self.events.send(IsolateEvent::Terminated(exit));
            *state = Lifecycle::Exited(exit);
            true
        });
        if exited {
            drop(lock(&self.terminator).take());
        }
    }

    /// Force the isolate down. Returns false if it had already exited.
    fn terminate(&self, cause: ExitCause) -> bool {
        let exited = self.lifecycle.send_if_modified(|state| {
            if state.is_exited() {
                return false;
            }
            let exit = Exit::terminated(cause);
            let _ = self.events.send(IsolateEvent::Terminated(exit));
            *state = Lifecycle::Exited(exit);
            true
        });
        if exited {
            // an idle isolate must never see its arguments now
            drop(lock(&self.arguments).take());
            let terminator = lock(&self.terminator).take();
            if let Some(kill) = terminator {
                kill();
            }
        }
        exited
    }
}

/// Create the caller half and the isolate half for one run of `computation`.
pub fn pair(computation: &str) -> (IsolateHandle, IsolatePort) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (lifecycle, _) = watch::channel(Lifecycle::Idle);
    let (arguments_tx, arguments_rx) = oneshot::channel();

    let shared = Arc::new(Shared {
        id: IsolateId::generate(),
        computation: computation.to_string(),
        lifecycle,
        events: events_tx,
        arguments: Mutex::new(Some(arguments_tx)),
        terminator: Mutex::new(None),
    });

    let handle = IsolateHandle {
        shared: Arc::clone(&shared),
        events: events_rx,
    };
    let port = IsolatePort {
        shared,
        arguments: Some(arguments_rx),
        reported: false,
    };
    (handle, port)
}

/// Caller-side handle to one isolate.
///
/// Owns the isolate: dropping the handle terminates it.
pub struct IsolateHandle {
    shared: Arc<Shared>,
    events: mpsc::UnboundedReceiver<IsolateEvent>,
}

impl IsolateHandle {
    pub fn id(&self) -> IsolateId {
        self.shared.id
    }

    pub fn computation(&self) -> &str {
        &self.shared.computation
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lifecycle()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<Lifecycle> {
        self.shared.lifecycle.subscribe()
    }

    /// Install the backend-specific kill action. Called by factories.
    ///
    /// Dropped without running if the isolate has already exited.
    pub fn set_terminator(&self, terminator: impl FnOnce() + Send + 'static) {
        let mut slot = lock(&self.shared.terminator);
        if !self.shared.lifecycle().is_exited() {
            *slot = Some(Box::new(terminator));
        }
    }

    /// Deliver the arguments. Only the first call (before termination) counts.
    pub fn post(&self, arguments: Vec<Value>) -> bool {
        self.shared.post(arguments)
    }

    /// Terminate the isolate. No-op once it has exited.
    pub fn terminate(&self) -> bool {
        self.shared.terminate(ExitCause::Terminated)
    }

    pub(crate) fn controller(&self) -> IsolateController {
        IsolateController {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Next lifecycle event. Never returns `None` while the handle is alive.
    pub async fn next_event(&mut self) -> Option<IsolateEvent> {
        self.events.recv().await
    }

    /// Wait for the exit and fold the events into one `AttemptResult`.
    ///
    /// The first outcome/runtime error is the recorded result; the exit signal
    /// decides whether it counts as success.
    pub async fn wait(mut self) -> AttemptResult {
        let mut recorded: Option<Result<Value, PoolError>> = None;
        loop {
            let event = match self.lifecycle().exit() {
                // already exited: everything it emitted is queued, drain it
                Some(exit) => match self.events.try_recv() {
                    Ok(event) => event,
                    Err(_) => return AttemptResult::from_exit(exit, recorded),
                },
                None => match self.events.recv().await {
                    Some(event) => event,
                    None => {
                        return AttemptResult::from_exit(
                            Exit::terminated(ExitCause::Terminated),
                            recorded,
                        );
                    }
                },
            };

            match event {
                IsolateEvent::Outcome(outcome) => {
                    recorded.get_or_insert_with(|| outcome.into_result());
                }
                IsolateEvent::RuntimeError(message) => {
                    recorded.get_or_insert(Err(PoolError::Runtime(message)));
                }
                IsolateEvent::Terminated(exit) => return AttemptResult::from_exit(exit, recorded),
            }
        }
    }
}

impl Drop for IsolateHandle {
    fn drop(&mut self) {
        self.shared.terminate(ExitCause::Terminated);
    }
}

impl std::fmt::Debug for IsolateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolateHandle")
            .field("id", &self.shared.id)
            .field("computation", &self.shared.computation)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

/// Cloneable control surface used by the scheduler (timers, cancellation).
#[derive(Clone)]
pub(crate) struct IsolateController {
    shared: Arc<Shared>,
}

impl IsolateController {
    pub(crate) fn id(&self) -> IsolateId {
        self.shared.id
    }

    pub(crate) fn post(&self, arguments: Vec<Value>) -> bool {
        self.shared.post(arguments)
    }

    pub(crate) fn terminate(&self, cause: ExitCause) -> bool {
        self.shared.terminate(cause)
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Lifecycle> {
        self.shared.lifecycle.subscribe()
    }
}

/// Isolate-side half: receives arguments and reports one result.
///
/// Dropping it without reporting counts as a runtime error.
pub struct IsolatePort {
    shared: Arc<Shared>,
    arguments: Option<oneshot::Receiver<Vec<Value>>>,
    reported: bool,
}

impl IsolatePort {
    pub fn id(&self) -> IsolateId {
        self.shared.id
    }

    pub fn computation(&self) -> &str {
        &self.shared.computation
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.lifecycle().is_exited()
    }

    /// Wait for the arguments. `None` if the isolate was terminated first.
    pub async fn arguments(&mut self) -> Option<Vec<Value>> {
        let rx = self.arguments.take()?;
        rx.await.ok()
    }

    pub fn complete(mut self, outcome: Outcome) {
        self.reported = true;
        let code = outcome.exit_code();
        self.shared.finish(IsolateEvent::Outcome(outcome), code);
    }

    pub fn crash(mut self, message: impl Into<String>) {
        self.reported = true;
        self.shared.finish(IsolateEvent::RuntimeError(message.into()), 1);
    }
}

impl Drop for IsolatePort {
    fn drop(&mut self) {
        if !self.reported {
            self.shared.finish(
                IsolateEvent::RuntimeError("isolate exited without reporting an outcome".into()),
                1,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ComputationError;
    use serde_json::json;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn outcome_then_clean_exit() {
        let (mut handle, mut port) = pair("c");
        assert_eq!(handle.lifecycle(), Lifecycle::Idle);

        assert!(handle.post(vec![json!(1)]));
        assert_eq!(handle.lifecycle(), Lifecycle::Running);
        assert_eq!(port.arguments().await, Some(vec![json!(1)]));

        port.complete(Outcome::success(json!(2)));
        assert_eq!(
            handle.next_event().await,
            Some(IsolateEvent::Outcome(Outcome::success(json!(2))))
        );
        assert_eq!(
            handle.next_event().await,
            Some(IsolateEvent::Terminated(Exit::completed(0)))
        );
    }

    #[tokio::test]
    async fn error_outcome_exits_non_zero() {
        let (handle, port) = pair("c");
        port.complete(Outcome::error("boom"));
        let result = handle.wait().await;
        assert_eq!(
            result,
            AttemptResult::Failed {
                error: Some(PoolError::Computation(ComputationError::new("boom"))),
                exit: Exit::completed(1),
            }
        );
    }

    #[tokio::test]
    async fn nothing_is_reported_after_termination() {
        let (mut handle, port) = pair("c");
        assert!(handle.terminate());
        assert!(!handle.terminate());
        assert!(port.is_terminated());

        port.complete(Outcome::success(json!(1)));
        assert_eq!(
            handle.next_event().await,
            Some(IsolateEvent::Terminated(Exit::terminated(ExitCause::Terminated)))
        );
        assert!(handle.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminate_after_completion_is_noop() {
        let (handle, port) = pair("c");
        port.complete(Outcome::success(json!(1)));
        assert!(!handle.terminate());
        assert_eq!(handle.wait().await, AttemptResult::Succeeded(json!(1)));
    }

    #[tokio::test]
    async fn terminated_isolate_never_receives_arguments() {
        let (handle, mut port) = pair("c");
        handle.terminate();
        assert!(!handle.post(vec![json!(1)]));
        assert_eq!(port.arguments().await, None);
    }

    #[tokio::test]
    async fn post_racing_terminate_delivers_only_when_running_first() {
        for _ in 0..500 {
            let (handle, mut port) = pair("c");
            let controller = handle.controller();
            let barrier = Arc::new(Barrier::new(2));

            let poster = {
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    controller.post(vec![json!(1)])
                })
            };
            barrier.wait();
            assert!(handle.terminate());
            let posted = poster.join().unwrap();

            assert!(!handle.post(vec![json!(2)]));
            let delivered = port.arguments().await;
            if posted {
                assert_eq!(delivered, Some(vec![json!(1)]));
            } else {
                assert_eq!(delivered, None);
            }
        }
    }

    #[tokio::test]
    async fn post_after_exit_keeps_arguments_back() {
        let (handle, mut port) = pair("c");
        let controller = handle.controller();
        assert!(controller.terminate(ExitCause::TimedOut));
        assert!(!controller.post(vec![json!(1)]));
        assert_eq!(
            handle.lifecycle(),
            Lifecycle::Exited(Exit::terminated(ExitCause::TimedOut))
        );
        assert_eq!(port.arguments().await, None);
    }

    #[tokio::test]
    async fn dropped_port_is_a_runtime_error() {
        let (handle, port) = pair("c");
        drop(port);
        let result = handle.wait().await;
        assert!(matches!(
            result,
            AttemptResult::Failed { error: Some(PoolError::Runtime(_)), exit } if exit.code == 1
        ));
    }

    #[tokio::test]
    async fn terminator_runs_once() {
        let kills = Arc::new(AtomicUsize::new(0));
        let (handle, _port) = pair("c");
        let counter = Arc::clone(&kills);
        handle.set_terminator(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handle.terminate();
        handle.terminate();
        drop(handle);
        assert_eq!(kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn terminator_not_run_after_natural_exit() {
        let kills = Arc::new(AtomicUsize::new(0));
        let (handle, port) = pair("c");
        let counter = Arc::clone(&kills);
        handle.set_terminator(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        port.crash("bad source");
        drop(handle);
        assert_eq!(kills.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dropping_handle_terminates() {
        let (handle, port) = pair("c");
        let mut lifecycle = handle.subscribe();
        drop(handle);
        let state = *lifecycle.wait_for(Lifecycle::is_exited).await.unwrap();
        assert_eq!(
            state,
            Lifecycle::Exited(Exit::terminated(ExitCause::Terminated))
        );
        assert!(port.is_terminated());
    }
}
