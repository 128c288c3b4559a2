//! Computation trait - 型付き computation の定義
//!
//! # 二層構造
//! - **表層（Typed）**: `Computation` - 引数と戻り値が型で決まる
//! - **内部（Dyn）**: `DynComputation` - object-safe, `serde_json::Value` で受け渡し
//!
//! Isolates never receive closures: they receive a registered name plus
//! positional plain-data arguments, and look the computation up themselves.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::ComputationError;

/// A named unit of work runnable inside an isolate.
///
/// # 使用例
/// ```ignore
/// struct Add;
///
/// #[async_trait]
/// impl Computation for Add {
///     const NAME: &'static str = "math.add.v1";
///     type Args = (i64, i64);
///     type Output = i64;
///
///     async fn run(&self, (a, b): (i64, i64)) -> Result<i64, ComputationError> {
///         Ok(a + b)
///     }
/// }
/// ```
///
/// `Args` is a tuple: each element is one positional argument.
#[async_trait]
pub trait Computation: Send + Sync + 'static {
    const NAME: &'static str;

    type Args: Serialize + DeserializeOwned + Send + 'static;
    type Output: Serialize + DeserializeOwned + Send + 'static;

    async fn run(&self, args: Self::Args) -> Result<Self::Output, ComputationError>;
}

/// Why a dynamic invocation did not produce a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// The computation returned an error (its own error channel).
    Failed(ComputationError),

    /// The invocation never reached the computation (bad arguments, bad output).
    Malformed(String),
}

/// Object-safe computation, stored in the registry.
#[async_trait]
pub trait DynComputation: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, arguments: Vec<Value>) -> Result<Value, Fault>;
}

/// Adapts a `Computation` to `DynComputation` (type erasure).
pub struct TypedComputation<C: Computation> {
    inner: C,
}

impl<C: Computation> TypedComputation<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: Computation> DynComputation for TypedComputation<C> {
    fn name(&self) -> &str {
        C::NAME
    }

    async fn invoke(&self, arguments: Vec<Value>) -> Result<Value, Fault> {
        let args: C::Args = decode_arguments(arguments)
            .map_err(|e| Fault::Malformed(format!("{}: argument decode: {e}", C::NAME)))?;

        let output = self.inner.run(args).await.map_err(Fault::Failed)?;

        serde_json::to_value(output)
            .map_err(|e| Fault::Malformed(format!("{}: result encode: {e}", C::NAME)))
    }
}

/// Turn a tuple of arguments into positional values.
///
/// `()` becomes no arguments; a non-sequence value is rejected.
pub fn encode_arguments<A: Serialize>(args: &A) -> Result<Vec<Value>, serde_json::Error> {
    match serde_json::to_value(args)? {
        Value::Array(values) => Ok(values),
        Value::Null => Ok(Vec::new()),
        other => Err(serde::ser::Error::custom(format!(
            "arguments must serialize to a sequence, got {other}"
        ))),
    }
}

/// Bind positional values back to a tuple of arguments.
pub fn decode_arguments<A: DeserializeOwned>(
    arguments: Vec<Value>,
) -> Result<A, serde_json::Error> {
    if arguments.is_empty() {
        // () only deserializes from null; sequences still get a chance first
        return serde_json::from_value(Value::Array(Vec::new()))
            .or_else(|_| serde_json::from_value(Value::Null));
    }
    serde_json::from_value(Value::Array(arguments))
}
