//! TypedPool - `Computation` 型に紐づいた Pool
//!
//! The name comes from `C::NAME`, arguments are `C::Args` and the settled
//! value is decoded back into `C::Output`, so a typo in a name or a mismatched
//! argument list is a compile error instead of a runtime one.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use super::computation::{Computation, encode_arguments};
use crate::app::pool::{Pool, create_pool};
use crate::domain::{ExecutionOptions, PoolError};
use crate::ports::IsolateFactory;

pub fn create_typed_pool<C: Computation>(
    factory: Arc<dyn IsolateFactory>,
    options: ExecutionOptions,
) -> TypedPool<C> {
    TypedPool {
        pool: create_pool(factory, C::NAME, options),
        _marker: PhantomData,
    }
}

pub struct TypedPool<C: Computation> {
    pool: Pool,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Computation> TypedPool<C> {
    /// Start an invocation (eagerly) and decode its value.
    pub fn call(
        &self,
        args: &C::Args,
    ) -> impl Future<Output = Result<C::Output, PoolError>> + Send + use<C> {
        let deferred = encode_arguments(args)
            .map_err(|e| PoolError::Arguments(e.to_string()))
            .map(|arguments| self.pool.call(arguments));

        async move {
            let value = deferred?.await?;
            serde_json::from_value(value).map_err(|e| PoolError::Decode(e.to_string()))
        }
    }

    pub fn untyped(&self) -> &Pool {
        &self.pool
    }
}

impl<C: Computation> Clone for TypedPool<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _marker: PhantomData,
        }
    }
}
