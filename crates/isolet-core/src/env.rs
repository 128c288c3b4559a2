//! Environment selection - which isolate factory a composition root uses.
//!
//! The core never looks at the environment; a binary picks a kind once and
//! passes the resulting factory to `create_pool` / `create_worker`.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::impls::{TaskIsolateFactory, ThreadIsolateFactory};
use crate::ports::IsolateFactory;
use crate::typed::ComputationRegistry;

/// Environment variable read by `IsolateKind::from_env`.
pub const ISOLATE_KIND_ENV: &str = "ISOLET_ISOLATE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolateKind {
    /// One OS thread per isolate.
    #[default]
    Thread,
    /// One Tokio task per isolate on the caller's runtime.
    Task,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown isolate kind '{0}' (expected 'thread' or 'task')")]
pub struct UnknownIsolateKind(pub String);

impl FromStr for IsolateKind {
    type Err = UnknownIsolateKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thread" => Ok(Self::Thread),
            "task" => Ok(Self::Task),
            other => Err(UnknownIsolateKind(other.to_string())),
        }
    }
}

impl IsolateKind {
    /// Read `ISOLET_ISOLATE`. Unset means the default (thread).
    pub fn from_env() -> Result<Self, UnknownIsolateKind> {
        match std::env::var(ISOLATE_KIND_ENV) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn factory(self, registry: Arc<ComputationRegistry>) -> Arc<dyn IsolateFactory> {
        match self {
            Self::Thread => Arc::new(ThreadIsolateFactory::new(registry)),
            Self::Task => Arc::new(TaskIsolateFactory::new(registry)),
        }
    }
}
