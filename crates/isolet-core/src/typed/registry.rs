//! ComputationRegistry - computation の登録と管理
//!
//! Computations are registered by name ahead of time. Isolate factories hold
//! the registry and resolve the name inside the isolate, so only the name and
//! plain-data arguments ever cross the isolate boundary.

use std::collections::HashMap;
use std::sync::Arc;

use super::computation::{Computation, DynComputation, TypedComputation};

/// Name -> computation map.
///
/// Built during initialization (mutable), shared read-only afterwards via `Arc`.
#[derive(Default)]
pub struct ComputationRegistry {
    computations: HashMap<String, Arc<dyn DynComputation>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("computation '{0}' is already registered")]
    AlreadyRegistered(String),
}

impl ComputationRegistry {
    pub fn new() -> Self {
        Self {
            computations: HashMap::new(),
        }
    }

    /// Register a typed computation under `C::NAME`.
    pub fn register<C: Computation>(&mut self, computation: C) -> Result<(), RegistryError> {
        self.register_dyn(C::NAME, Arc::new(TypedComputation::new(computation)))
    }

    /// Register an already-erased computation under an explicit name.
    pub fn register_dyn(
        &mut self,
        name: impl Into<String>,
        computation: Arc<dyn DynComputation>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.computations.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.computations.insert(name, computation);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DynComputation>> {
        self.computations.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.computations.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.computations.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.computations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.computations.is_empty()
    }
}
