//! Typed - 型付き computation API
//!
//! Computations are registered by name instead of being shipped as code:
//! only the name and plain-data arguments cross into an isolate.
//!
//! # 二層構造
//! - **表層（Typed）**: `Computation`, `TypedPool<C>` - 型安全
//! - **内部（Dyn）**: `DynComputation` - object-safe, type erasure

pub mod computation;
pub mod pool;
pub mod registry;

pub use self::computation::{
    Computation, DynComputation, Fault, TypedComputation, decode_arguments, encode_arguments,
};
pub use self::pool::{TypedPool, create_typed_pool};
pub use self::registry::{ComputationRegistry, RegistryError};
