//! Provisioning backend errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend executable could not be started
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully
    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The command output is not the JSON document expected
    #[error("{command}: error parsing JSON: {source}")]
    InvalidJson {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    /// Valid JSON lacking a required field
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        BackendError::UnexpectedResponse(message.into())
    }
}
