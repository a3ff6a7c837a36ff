//! Execution primitives for alertload runs
//!
//! [`WorkQueue`] runs a batch of remote calls with bounded concurrency and
//! returns per-item outcomes in input order. [`PeriodicSampler`] runs a
//! cycle on a fixed interval in the background until it is cancelled.

pub mod error;
pub mod periodic;
pub mod work_queue;

// Re-export main types
pub use error::ExecutionError;
pub use periodic::{PeriodicSampler, SamplerHandle};
pub use work_queue::{ErrorPolicy, WorkOutcome, WorkQueue, WorkResult, WorkSummary};
