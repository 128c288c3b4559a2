//! Scheduler - start delay, timeout, cancellation for one isolate run.
//!
//! # フロー
//! 1. spawn（すぐに生成、起動コストを delay と重ねる）
//! 2. start delay 経過後に arguments を post
//! 3. timeout（spawn 時点から計測）で terminate
//! 4. cancellation で即 terminate
//! 5. isolate が exit したら全タイマーを破棄

use std::future::pending;

use serde_json::Value;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use super::isolate::{IsolateController, IsolateHandle};
use crate::domain::{CancellationSignal, ExecutionOptions, ExitCause, Lifecycle};
use crate::ports::IsolateFactory;

/// Spawn one isolate for `computation` and apply `options` to it.
///
/// Single attempt, no retries: this is the low-level entry point for callers
/// who want to drive the handle themselves. Must be called inside a Tokio
/// runtime (the timers run on a supervisor task).
///
/// Timeout and cancellation never produce an outcome; they only end the run
/// with a non-zero exit.
pub fn create_worker(
    factory: &dyn IsolateFactory,
    computation: &str,
    options: &ExecutionOptions,
    arguments: Vec<Value>,
) -> IsolateHandle {
    let spawned_at = Instant::now();
    let handle = factory.spawn(computation);
    let controller = handle.controller();

    let start_delay = options.start_delay.filter(|delay| !delay.is_zero());
    let pending_arguments = if start_delay.is_none() && !options.is_cancelled() {
        controller.post(arguments);
        None
    } else {
        Some(arguments)
    };

    let schedule = Schedule {
        start_at: spawned_at + start_delay.unwrap_or_default(),
        deadline: options.timeout.map(|timeout| spawned_at + timeout),
        cancellation: options.cancellation.clone(),
    };
    tokio::spawn(supervise(controller, pending_arguments, schedule));

    handle
}

/// Timer targets, fixed at spawn time.
struct Schedule {
    start_at: Instant,
    deadline: Option<Instant>,
    cancellation: Option<CancellationSignal>,
}

async fn supervise(
    controller: IsolateController,
    mut arguments: Option<Vec<Value>>,
    schedule: Schedule,
) {
    let isolate = controller.id();
    let mut lifecycle = controller.subscribe();

    let start = sleep_until(schedule.start_at);
    let deadline = async {
        match schedule.deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => pending().await,
        }
    };
    let cancelled = async {
        match &schedule.cancellation {
            Some(signal) => signal.cancelled().await,
            None => pending().await,
        }
    };
    tokio::pin!(start, deadline, cancelled);

    loop {
        tokio::select! {
            biased;

            _ = &mut cancelled => {
                if controller.terminate(ExitCause::Cancelled) {
                    info!(%isolate, "isolate cancelled");
                }
                break;
            }
            // terminal event observed: drop both timers
            _ = lifecycle.wait_for(Lifecycle::is_exited) => break,
            _ = &mut deadline => {
                if controller.terminate(ExitCause::TimedOut) {
                    warn!(%isolate, "isolate timed out");
                }
                break;
            }
            _ = &mut start, if arguments.is_some() => {
                if let Some(arguments) = arguments.take()
                    && controller.post(arguments)
                {
                    debug!(%isolate, "arguments delivered");
                }
            }
        }
    }
}
