//! Resilience patterns for alertload
//!
//! This crate provides the fixed-interval retry policy every remote call in
//! the tool is wrapped in.

pub mod retry;

// Re-export commonly used types
pub use retry::{RetryError, RetryExecutor, RetryPolicy};
