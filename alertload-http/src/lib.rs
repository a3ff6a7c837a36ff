//! HTTP clients for alertload
//!
//! A shared JSON [`HttpManager`], the Kibana API used for telemetry and rule
//! creation, and the Elasticsearch event log read through
//! [`PaginatedFetcher`].

pub mod client;
pub mod elasticsearch;
pub mod errors;
pub mod kibana;
pub mod pagination;

// Re-export main types for convenience
pub use client::{Endpoint, HttpManager};
pub use alertload_config::HttpConfig;
pub use elasticsearch::{EventLogSource, EVENT_LOG_INDEX};
pub use errors::{HttpError, PaginationError};
pub use kibana::{KibanaApi, KibanaClient, KibanaStatus, RuleRequest, TaskManagerHealth};
pub use pagination::{Page, PageSource, PaginatedFetcher};
