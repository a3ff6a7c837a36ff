//! Error types for the execution primitives

use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("sampler task panicked: {0}")]
    SamplerPanicked(String),

    #[error("sampler task was aborted")]
    SamplerAborted,
}

impl From<JoinError> for ExecutionError {
    fn from(err: JoinError) -> Self {
        if err.is_cancelled() {
            Self::SamplerAborted
        } else {
            Self::SamplerPanicked(err.to_string())
        }
    }
}
