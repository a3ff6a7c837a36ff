//! Configuration sections, one module each

pub mod http;
pub mod logging;
pub mod provisioning;
pub mod report;
pub mod retry;
pub mod run;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

const SAMPLE_HEADER: &str = "\
# alertload configuration
# Durations are whole seconds (30) or text such as 90s or 15m.
# ALERTLOAD_* environment variables override these values.
";

/// The whole configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AlertLoadConfig {
    pub provisioning: provisioning::ProvisioningConfig,
    pub http: http::HttpConfig,
    pub run: run::RunConfig,
    pub retry: retry::RetryConfig,
    pub logging: logging::LoggingConfig,
    pub report: report::ReportConfig,
}

impl AlertLoadConfig {
    /// Check every section, stopping at the first problem
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.provisioning.validate()?;
        self.http.validate()?;
        self.run.validate()?;
        self.retry.validate()?;
        self.logging.validate()?;
        self.report.validate()
    }

    /// The defaults as a commented YAML file
    pub fn generate_sample() -> String {
        match serde_yaml::to_string(&Self::default()) {
            Ok(body) => format!("{}{}", SAMPLE_HEADER, body),
            Err(e) => format!("# cannot render sample configuration: {}\n", e),
        }
    }
}
