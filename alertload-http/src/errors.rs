//! HTTP error types

use alertload_resilience::RetryError;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx answer; `body` is kept for the log line
    #[error("HTTP {status} from {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    #[error("bad url: {0}")]
    BadUrl(String),

    #[error("cannot decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|status| status.as_u16()),
            Self::BadUrl(_) | Self::Decode(_) | Self::Unexpected(_) => None,
        }
    }
}

/// Failure of a paginated read
#[derive(Debug, thiserror::Error)]
pub enum PaginationError {
    /// Still failing after the retries of the first page
    #[error("first page: {0}")]
    FirstPage(#[from] RetryError<HttpError>),

    /// Continuation pages are read once
    #[error("page {page}: {source}")]
    Continuation {
        page: usize,
        #[source]
        source: HttpError,
    },
}
