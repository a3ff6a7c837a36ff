//! alertload configuration
//!
//! One YAML file split into sections (provisioning, http, run, retry,
//! logging, report). Every section has defaults and its own checks, and a
//! few values can be overridden through `ALERTLOAD_*` environment variables.

pub mod domains;
pub mod duration;
pub mod error;
pub mod loader;
pub mod validation;

pub use domains::{
    http::HttpConfig,
    logging::{LogFormat, LoggingConfig},
    provisioning::ProvisioningConfig,
    report::ReportConfig,
    retry::RetryConfig,
    run::{RunConfig, MAX_LOG_PAGE_SIZE},
    AlertLoadConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::{Check, Validatable};
