//! How deployments are created, polled and staggered

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// ecctl config name, resolved by ecctl as `$HOME/.ecctl/<name>.json`
    pub ecctl_config: String,

    pub ecctl_binary: String,

    /// Delay between health polls
    #[serde(with = "crate::duration::seconds")]
    pub poll_interval: Duration,

    /// Time a deployment gets to report healthy
    #[serde(with = "crate::duration::seconds")]
    pub wait_budget: Duration,

    /// Gap between consecutive creation submissions
    #[serde(with = "crate::duration::seconds")]
    pub stagger: Duration,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            ecctl_config: "config".to_string(),
            ecctl_binary: "ecctl".to_string(),
            poll_interval: Duration::from_secs(10),
            wait_budget: Duration::from_secs(10 * 60),
            stagger: Duration::from_secs(2),
        }
    }
}

impl Validatable for ProvisioningConfig {
    const DOMAIN: &'static str = "provisioning";

    fn validate(&self) -> ConfigResult<()> {
        let check = Self::check();
        check.not_blank("ecctl_config", &self.ecctl_config)?;
        check.not_blank("ecctl_binary", &self.ecctl_binary)?;
        check.not_zero("poll_interval", self.poll_interval)?;
        check.not_zero("wait_budget", self.wait_budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProvisioningConfig::default();
        assert_eq!(config.ecctl_config, "config");
        assert_eq!(config.wait_budget, Duration::from_secs(600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_stagger_is_allowed() {
        let config = ProvisioningConfig {
            stagger: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = ProvisioningConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ProvisioningConfig {
            ecctl_config: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
