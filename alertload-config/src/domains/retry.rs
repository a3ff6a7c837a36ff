//! Retry settings applied to every remote call

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Fixed pause between attempts
    #[serde(with = "crate::duration::seconds")]
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl Validatable for RetryConfig {
    const DOMAIN: &'static str = "retry";

    fn validate(&self) -> ConfigResult<()> {
        if self.max_retries > 0 {
            Self::check().not_zero("delay", self.delay)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_needed_only_with_retries() {
        assert!(RetryConfig::default().validate().is_ok());

        let config = RetryConfig {
            max_retries: 2,
            delay: Duration::ZERO,
        };
        assert!(config.validate().is_err());

        let config = RetryConfig {
            max_retries: 0,
            delay: Duration::ZERO,
        };
        assert!(config.validate().is_ok());
    }
}
