//! Test fixtures: sample computations and a spawn-counting factory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::app::isolate::IsolateHandle;
use crate::domain::ComputationError;
use crate::impls::TaskIsolateFactory;
use crate::ports::IsolateFactory;
use crate::typed::{Computation, ComputationRegistry};

pub struct Add;

#[async_trait]
impl Computation for Add {
    const NAME: &'static str = "test.math.add.v1";
    type Args = (i64, i64);
    type Output = i64;

    async fn run(&self, (a, b): (i64, i64)) -> Result<i64, ComputationError> {
        Ok(a + b)
    }
}

pub struct AlwaysFails {
    message: String,
}

impl AlwaysFails {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Computation for AlwaysFails {
    const NAME: &'static str = "test.always_fails.v1";
    type Args = ();
    type Output = ();

    async fn run(&self, _: ()) -> Result<(), ComputationError> {
        Err(ComputationError::new(self.message.clone()))
    }
}

/// Never completes.
pub struct Never;

#[async_trait]
impl Computation for Never {
    const NAME: &'static str = "test.never.v1";
    type Args = ();
    type Output = ();

    async fn run(&self, _: ()) -> Result<(), ComputationError> {
        std::future::pending().await
    }
}

pub struct Panics;

#[async_trait]
impl Computation for Panics {
    const NAME: &'static str = "test.panics.v1";
    type Args = ();
    type Output = ();

    async fn run(&self, _: ()) -> Result<(), ComputationError> {
        panic!("kaboom")
    }
}

/// Fails the first `failures` calls, then returns the 1-based call number.
pub struct Flaky {
    failures: usize,
    calls: Arc<AtomicUsize>,
}

impl Flaky {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Computation for Flaky {
    const NAME: &'static str = "test.flaky.v1";
    type Args = ();
    type Output = usize;

    async fn run(&self, _: ()) -> Result<usize, ComputationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(ComputationError::new(format!("failure {call}")));
        }
        Ok(call)
    }
}

/// Records the (tokio) instant it was invoked, then fails.
pub struct Stamped {
    pub stamps: Arc<Mutex<Vec<Instant>>>,
}

#[async_trait]
impl Computation for Stamped {
    const NAME: &'static str = "test.stamped.v1";
    type Args = ();
    type Output = ();

    async fn run(&self, _: ()) -> Result<(), ComputationError> {
        self.stamps.lock().unwrap().push(Instant::now());
        Err(ComputationError::new("boom"))
    }
}

/// Sleeps for the given number of milliseconds, then echoes it.
pub struct Sleeps;

#[async_trait]
impl Computation for Sleeps {
    const NAME: &'static str = "test.sleeps.v1";
    type Args = (u64,);
    type Output = u64;

    async fn run(&self, (ms,): (u64,)) -> Result<u64, ComputationError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(ms)
    }
}

/// Registry with the stateless fixtures.
pub fn registry() -> Arc<ComputationRegistry> {
    let mut registry = ComputationRegistry::new();
    registry.register(Add).unwrap();
    registry.register(AlwaysFails::new("boom")).unwrap();
    registry.register(Never).unwrap();
    registry.register(Panics).unwrap();
    registry.register(Sleeps).unwrap();
    Arc::new(registry)
}

/// Task-isolate factory that counts spawns.
pub struct CountingFactory {
    inner: TaskIsolateFactory,
    spawns: AtomicUsize,
}

impl CountingFactory {
    pub fn new(registry: Arc<ComputationRegistry>) -> Arc<Self> {
        Arc::new(Self {
            inner: TaskIsolateFactory::new(registry),
            spawns: AtomicUsize::new(0),
        })
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }
}

impl IsolateFactory for CountingFactory {
    fn spawn(&self, computation: &str) -> IsolateHandle {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        self.inner.spawn(computation)
    }

    fn kind(&self) -> &'static str {
        "counting"
    }
}
