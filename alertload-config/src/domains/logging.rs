//! Log output settings

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, a bare level (`debug`) or per target
    /// (`info,alertload_deploy=trace`)
    pub level: String,

    pub format: LogFormat,

    /// Print file and line of each event
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            include_location: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Compact,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Compact => "compact",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Text, Self::Compact, Self::Json]
            .into_iter()
            .find(|format| s.eq_ignore_ascii_case(format.as_str()))
            .ok_or_else(|| format!("expected text, compact or json, got {}", s))
    }
}

impl Validatable for LoggingConfig {
    const DOMAIN: &'static str = "logging";

    fn validate(&self) -> ConfigResult<()> {
        Self::check().not_blank("level", &self.level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_directive_level_from_yaml() {
        let config: LoggingConfig =
            serde_yaml::from_str("level: info,alertload_deploy=trace\nformat: json").unwrap();
        assert_eq!(config.level, "info,alertload_deploy=trace");
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.include_location);
    }
}
