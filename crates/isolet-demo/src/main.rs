use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use isolet_core::{
    CancellationSignal, Computation, ComputationError, ComputationRegistry, ExecutionOptions,
    IsolateKind, create_typed_pool,
};

struct Add;

#[async_trait]
impl Computation for Add {
    const NAME: &'static str = "demo.math.add.v1";
    type Args = (i64, i64);
    type Output = i64;

    async fn run(&self, (a, b): (i64, i64)) -> Result<i64, ComputationError> {
        Ok(a + b)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Greeting {
    text: String,
}

/// Fails `remaining_failures` times before greeting.
struct Hello {
    remaining_failures: AtomicU32,
}

impl Hello {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl Computation for Hello {
    const NAME: &'static str = "demo.hello.v1";
    type Args = (String,);
    type Output = Greeting;

    async fn run(&self, (name,): (String,)) -> Result<Greeting, ComputationError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(ComputationError::new(format!("intentional failure (left={left})")));
        }
        Ok(Greeting {
            text: format!("Hello, {name}!"),
        })
    }
}

/// Sleeps far longer than any demo timeout.
struct Stuck;

#[async_trait]
impl Computation for Stuck {
    const NAME: &'static str = "demo.stuck.v1";
    type Args = ();
    type Output = ();

    async fn run(&self, _: ()) -> Result<(), ComputationError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,isolet_core=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // (A) computation を名前で登録
    let mut registry = ComputationRegistry::new();
    registry.register(Add)?;
    registry.register(Hello::new(2))?;
    registry.register(Stuck)?;

    // (B) composition root で isolate factory を 1 回だけ選ぶ
    let kind = IsolateKind::from_env()?;
    let factory = kind.factory(Arc::new(registry));
    tracing::info!(?kind, "isolate factory selected");

    // (C) plain call: one isolate, no retries
    let add = create_typed_pool::<Add>(factory.clone(), ExecutionOptions::new());
    println!("2 + 3 = {}", add.call(&(2, 3)).await?);

    // (D) retries with backoff: two failures, then success on the third isolate
    let hello = create_typed_pool::<Hello>(
        factory.clone(),
        ExecutionOptions::new()
            .with_retry_delays([Duration::from_millis(50), Duration::from_millis(100)]),
    );
    let report = hello
        .untyped()
        .call(vec![serde_json::json!("isolet")])
        .report()
        .await;
    println!(
        "hello: result={:?} attempts={}/{}",
        report.result,
        report.attempts.len(),
        hello.untyped().options().max_retries() + 1
    );
    println!("{}", serde_json::to_string_pretty(&report.attempts)?);

    // (E) timeout: the stuck computation is terminated and retried once
    let stuck = create_typed_pool::<Stuck>(
        factory.clone(),
        ExecutionOptions::new()
            .with_timeout(Duration::from_millis(200))
            .with_retry_delays([Duration::from_millis(50)]),
    );
    println!("stuck: {:?}", stuck.call(&()).await);

    // (F) cancellation: fires while the first attempt is still running
    let signal = CancellationSignal::new();
    let cancellable = create_typed_pool::<Stuck>(
        factory,
        ExecutionOptions::new()
            .with_cancellation(signal.clone())
            .with_retry_delays([Duration::from_millis(50)]),
    );
    let pending = cancellable.call(&());
    tokio::time::sleep(Duration::from_millis(100)).await;
    signal.cancel();
    println!("cancelled: {:?}", pending.await);

    Ok(())
}
