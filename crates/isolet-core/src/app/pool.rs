//! Pool - retrying runner
//!
//! `create_pool` binds a factory, a computation name and options once.
//! Every `Pool::call` is an independent invocation with its own retry state
//! and its own chain of isolates, settled exactly once through a oneshot.
//!
//! # フロー（1 invocation）
//! 1. create_worker で新しい isolate を 1 つ起動
//! 2. wait() で AttemptResult を得る
//! 3. RetryState::decide → Resolve / Retry(delay) / Reject
//! 4. Retry なら delay 待機後 1 に戻る（isolate は毎回新規）

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{Instrument, debug, info_span};

use super::scheduler::create_worker;
use crate::domain::{AttemptRecord, Decision, ExecutionOptions, InvocationId, PoolError, RetryState};
use crate::ports::{IsolateFactory, ProgressLogger, TracingLogger};

/// Build a retrying callable for `computation`.
pub fn create_pool(
    factory: Arc<dyn IsolateFactory>,
    computation: impl Into<String>,
    options: ExecutionOptions,
) -> Pool {
    Pool {
        inner: Arc::new(PoolInner {
            factory,
            computation: computation.into(),
            options,
        }),
    }
}

struct PoolInner {
    factory: Arc<dyn IsolateFactory>,
    computation: String,
    options: ExecutionOptions,
}

/// Retrying callable. Cheap to clone; clones share configuration only.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    pub fn computation(&self) -> &str {
        &self.inner.computation
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.inner.options
    }

    /// Start an invocation. It runs eagerly on the current Tokio runtime,
    /// whether or not the returned `Deferred` is awaited.
    pub fn call(&self, arguments: Vec<Value>) -> Deferred {
        let invocation_id = InvocationId::generate();
        let (tx, rx) = oneshot::channel();

        let span = info_span!(
            "invocation",
            id = %invocation_id,
            computation = %self.inner.computation,
            isolate_kind = self.inner.factory.kind(),
        );
        let inner = Arc::clone(&self.inner);
        tokio::spawn(
            async move {
                let report = run_invocation(inner, invocation_id, arguments).await;
                // receiver may be gone; the invocation still ran to completion
                let _ = tx.send(report);
            }
            .instrument(span),
        );

        Deferred { invocation_id, rx }
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("computation", &self.inner.computation)
            .field("kind", &self.inner.factory.kind())
            .field("options", &self.inner.options)
            .finish()
    }
}

/// Everything that happened during one invocation.
#[derive(Debug, Clone)]
pub struct InvocationReport {
    pub invocation_id: InvocationId,
    pub computation: String,
    pub attempts: Vec<AttemptRecord>,
    pub result: Result<Value, PoolError>,
}

/// Single-assignment result of `Pool::call`.
///
/// Awaiting it yields the value or the final error; `report()` also returns
/// the attempt history.
pub struct Deferred {
    invocation_id: InvocationId,
    rx: oneshot::Receiver<InvocationReport>,
}

impl Deferred {
    pub fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    pub async fn report(self) -> InvocationReport {
        let invocation_id = self.invocation_id;
        self.rx.await.unwrap_or_else(|_| InvocationReport {
            invocation_id,
            computation: String::new(),
            attempts: Vec::new(),
            result: Err(abandoned()),
        })
    }
}

impl Future for Deferred {
    type Output = Result<Value, PoolError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|report| match report {
            Ok(report) => report.result,
            Err(_) => Err(abandoned()),
        })
    }
}

fn abandoned() -> PoolError {
    PoolError::Runtime("invocation was dropped before settling".to_string())
}

async fn run_invocation(
    inner: Arc<PoolInner>,
    invocation_id: InvocationId,
    arguments: Vec<Value>,
) -> InvocationReport {
    let options = &inner.options;
    let logger: Arc<dyn ProgressLogger> = options
        .logger
        .clone()
        .unwrap_or_else(|| Arc::new(TracingLogger));

    let mut state = RetryState::new();
    let mut attempts = Vec::new();

    let result = loop {
        let started_at = Utc::now();
        let handle = create_worker(
            inner.factory.as_ref(),
            &inner.computation,
            options,
            arguments.clone(),
        );
        let isolate_id = handle.id();
        let outcome = handle.wait().await;
        attempts.push(AttemptRecord::new(
            attempts.len() + 1,
            isolate_id,
            &outcome,
            started_at,
        ));

        match state.decide(outcome, &options.retry_delays) {
            Decision::Resolve(value) => break Ok(value),
            Decision::Reject(error) => break Err(error),
            Decision::Retry { delay, retry } => {
                let reason = state
                    .last_error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "isolate stopped".to_string());
                logger.notice(&format!(
                    "{} failed ({reason}), retrying in {}ms (retry {retry}/{})",
                    inner.computation,
                    delay.as_millis(),
                    options.max_retries(),
                ));

                match &options.cancellation {
                    Some(signal) => {
                        tokio::select! {
                            _ = signal.cancelled() => break Err(PoolError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => tokio::time::sleep(delay).await,
                }
            }
        }
    };

    debug!(
        attempts = attempts.len(),
        ok = result.is_ok(),
        "invocation settled"
    );
    InvocationReport {
        invocation_id,
        computation: inner.computation.clone(),
        attempts,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttemptStatus, CancellationSignal, ComputationError};
    use crate::testing::{Add, AlwaysFails, CountingFactory, Flaky, Never, Stamped, registry};
    use crate::typed::{Computation, ComputationRegistry};
    use rstest::rstest;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    fn ms(values: &[u64]) -> Vec<Duration> {
        values.iter().copied().map(Duration::from_millis).collect()
    }

    /// Collects retry notices.
    #[derive(Default)]
    struct Notices(Mutex<Vec<String>>);

    impl ProgressLogger for Notices {
        fn notice(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    #[tokio::test]
    async fn first_success_resolves_with_one_spawn() {
        let factory = CountingFactory::new(registry());
        let pool = create_pool(factory.clone(), Add::NAME, ExecutionOptions::new());

        assert_eq!(pool.call(vec![json!(2), json!(3)]).await.unwrap(), json!(5));
        assert_eq!(factory.spawns(), 1);
    }

    #[rstest]
    #[case(&[])]
    #[case(&[1])]
    #[case(&[1, 2, 3])]
    #[tokio::test(start_paused = true)]
    async fn unconditional_failure_spawns_k_plus_one(#[case] delays: &[u64]) {
        let factory = CountingFactory::new(registry());
        let options = ExecutionOptions::new().with_retry_delays(ms(delays));
        let pool = create_pool(factory.clone(), AlwaysFails::NAME, options);

        let report = pool.call(Vec::new()).report().await;
        assert_eq!(factory.spawns(), delays.len() + 1);
        assert_eq!(report.attempts.len(), delays.len() + 1);
        assert_eq!(
            report.result,
            Err(PoolError::Computation(ComputationError::new("boom")))
        );
        let failed = |a: &AttemptRecord| a.status == AttemptStatus::Failed;
        assert!(report.attempts.iter().all(failed));
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[tokio::test(start_paused = true)]
    async fn succeeds_after_k_failures(#[case] k: usize) {
        let mut registry = ComputationRegistry::new();
        registry.register(Flaky::new(k)).unwrap();
        let factory = CountingFactory::new(Arc::new(registry));

        let delays = vec![Duration::from_millis(5); k];
        let options = ExecutionOptions::new().with_retry_delays(delays);
        let pool = create_pool(factory.clone(), Flaky::NAME, options);

        let value = pool.call(Vec::new()).await.unwrap();
        assert_eq!(value, json!(k + 1));
        assert_eq!(factory.spawns(), k + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_follow_backoff_schedule() {
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ComputationRegistry::new();
        registry
            .register(Stamped {
                stamps: Arc::clone(&stamps),
            })
            .unwrap();
        let factory = CountingFactory::new(Arc::new(registry));
        let notices = Arc::new(Notices::default());

        let options = ExecutionOptions::new()
            .with_retry_delays(ms(&[10, 20]))
            .with_logger(notices.clone());
        let pool = create_pool(factory.clone(), Stamped::NAME, options);

        let t0 = tokio::time::Instant::now();
        let err = pool.call(Vec::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(factory.spawns(), 3);

        let offsets: Vec<u128> = stamps
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(t0).as_millis())
            .collect();
        assert_eq!(offsets.len(), 3);
        assert!(offsets[0] < 5);
        assert!((10..15).contains(&offsets[1]));
        assert!((30..35).contains(&offsets[2]));

        let notices = notices.0.lock().unwrap();
        assert_eq!(notices.len(), 2);
        assert!(notices[0].contains("retry 1/2"));
        assert!(notices[1].contains("retry 2/2"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_failed_attempt_and_retries() {
        let factory = CountingFactory::new(registry());
        let options = ExecutionOptions::new()
            .with_timeout(Duration::from_millis(50))
            .with_retry_delays(ms(&[10]));
        let pool = create_pool(factory.clone(), Never::NAME, options);

        let report = pool.call(Vec::new()).report().await;
        assert_eq!(factory.spawns(), 2);
        assert_eq!(report.result, Err(PoolError::Stopped { code: 1 }));
        let timed_out = |a: &AttemptRecord| a.status == AttemptStatus::TimedOut;
        assert!(report.attempts.iter().all(timed_out));
    }

    #[tokio::test]
    async fn already_cancelled_spawns_once_and_never_retries() {
        let factory = CountingFactory::new(registry());
        let signal = CancellationSignal::new();
        signal.cancel();
        let options = ExecutionOptions::new()
            .with_cancellation(signal)
            .with_retry_delays(ms(&[1, 1, 1]));
        let pool = create_pool(factory.clone(), Add::NAME, options);

        let report = pool.call(vec![json!(1), json!(2)]).report().await;
        assert_eq!(report.result, Err(PoolError::Cancelled));
        assert_eq!(factory.spawns(), 1);
        assert_eq!(report.attempts[0].status, AttemptStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_rejects_without_spawning() {
        let factory = CountingFactory::new(registry());
        let signal = CancellationSignal::new();
        let options = ExecutionOptions::new()
            .with_cancellation(signal.clone())
            .with_retry_delays(ms(&[1_000]));
        let pool = create_pool(factory.clone(), AlwaysFails::NAME, options);

        let pending = pool.call(Vec::new());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(factory.spawns(), 1);

        signal.cancel();
        assert_eq!(pending.await, Err(PoolError::Cancelled));
        assert_eq!(factory.spawns(), 1);
    }

    #[tokio::test]
    async fn invocations_are_independent() {
        let mut registry = ComputationRegistry::new();
        registry.register(Flaky::new(1)).unwrap();
        let factory = CountingFactory::new(Arc::new(registry));
        // no retries: the first call fails, the second succeeds
        let pool = create_pool(factory.clone(), Flaky::NAME, ExecutionOptions::new());

        let first = pool.call(Vec::new()).report().await;
        let second = pool.call(Vec::new()).report().await;

        assert_eq!(first.result.unwrap_err().to_string(), "failure 1");
        assert_eq!(second.result.unwrap(), json!(2));
        assert_eq!(first.attempts.len(), 1);
        assert_eq!(second.attempts.len(), 1);
        assert_ne!(first.invocation_id, second.invocation_id);
    }

    #[tokio::test]
    async fn pool_keeps_its_binding() {
        let options = ExecutionOptions::new()
            .with_timeout(Duration::from_millis(50))
            .with_retry_delays(ms(&[10, 20]));
        let pool = create_pool(CountingFactory::new(registry()), Add::NAME, options);

        let copy = pool.clone();
        assert_eq!(copy.computation(), Add::NAME);
        assert_eq!(copy.options().timeout, Some(Duration::from_millis(50)));
        assert_eq!(copy.options().max_retries(), 2);
    }

    #[tokio::test]
    async fn unregistered_computation_rejects_with_runtime_error() {
        let factory = CountingFactory::new(registry());
        let pool = create_pool(factory, "nope", ExecutionOptions::new());
        let err = pool.call(Vec::new()).await.unwrap_err();
        assert!(matches!(err, PoolError::Runtime(msg) if msg.contains("nope")));
    }

    #[tokio::test]
    async fn invocation_runs_without_being_awaited() {
        let factory = CountingFactory::new(registry());
        let pool = create_pool(factory.clone(), Add::NAME, ExecutionOptions::new());

        let deferred = pool.call(vec![json!(1), json!(1)]);
        let id = deferred.invocation_id();
        drop(deferred);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(factory.spawns(), 1);
        assert!(id.to_string().starts_with("call-"));
    }
}
