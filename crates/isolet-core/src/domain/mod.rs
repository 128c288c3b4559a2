//! Domain model (ids, outcomes, lifecycle, options, decisions, errors).
//!
//! Architecture-agnostic: nothing here spawns isolates or touches timers.

pub mod attempt;
pub mod cancel;
pub mod decision;
pub mod errors;
pub mod ids;
pub mod options;
pub mod outcome;
pub mod state;

pub use attempt::{AttemptRecord, AttemptStatus};
pub use cancel::CancellationSignal;
pub use decision::{Decision, RetryState};
pub use errors::{ComputationError, PoolError};
pub use ids::{InvocationId, IsolateId};
pub use options::{ExecutionOptions, OptionsConfig};
pub use outcome::{AttemptResult, Outcome};
pub use state::{Exit, ExitCause, Lifecycle, TERMINATED_EXIT_CODE};
