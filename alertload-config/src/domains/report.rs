//! Where run reports go

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Receives `<run-name>.json`
    pub output_dir: PathBuf,

    pub pretty: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            pretty: true,
        }
    }
}

impl Validatable for ReportConfig {
    const DOMAIN: &'static str = "report";

    fn validate(&self) -> ConfigResult<()> {
        Self::check().not_blank("output_dir", &self.output_dir.to_string_lossy())
    }
}
