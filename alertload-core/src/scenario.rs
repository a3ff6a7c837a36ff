//! Scenarios and suites: what to provision and how much load to drive

use serde::{Deserialize, Serialize};

use crate::error::{AlertLoadError, Result};
use crate::types::{ResourceSize, Subsystem};

/// Task manager defaults Kibana ships with; only non-default values get patched in
pub const DEFAULT_TM_MAX_WORKERS: u32 = 10;
pub const DEFAULT_TM_POLL_INTERVAL_MS: u64 = 3000;

/// Requested shape of one deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    /// Elasticsearch size
    pub es: ResourceSize,

    /// Kibana size
    pub kb: ResourceSize,

    /// Stack version; the provider default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Deployment template id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    #[serde(default = "default_tm_max_workers")]
    pub tm_max_workers: u32,

    #[serde(default = "default_tm_poll_interval")]
    pub tm_poll_interval: u64,
}

impl DeploymentSpec {
    pub fn new(es: ResourceSize, kb: ResourceSize) -> Self {
        Self {
            es,
            kb,
            version: None,
            template: None,
            tm_max_workers: DEFAULT_TM_MAX_WORKERS,
            tm_poll_interval: DEFAULT_TM_POLL_INTERVAL_MS,
        }
    }

    /// Total memory per subsystem in GB, after validating against the menus
    pub fn normalized_sizes(&self) -> Result<(u32, u32)> {
        let es = Subsystem::Elasticsearch.normalize(self.es)?;
        let kb = Subsystem::Kibana.normalize(self.kb)?;
        Ok((es, kb))
    }
}

/// One deployment plus the rule load driven against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    /// Number of rules to create
    pub alerts: usize,

    /// Rule schedule interval, e.g. `5s`
    #[serde(default = "default_alert_interval")]
    pub alert_interval: String,

    /// Share of rules that fire on every execution, 0..=100
    #[serde(default)]
    pub percent_firing: i32,

    pub deployment: DeploymentSpec,
}

impl Scenario {
    /// Whether rule `index` (0-based) is created as a firing rule
    pub fn is_firing(&self, index: usize) -> bool {
        is_firing(index, self.alerts, self.percent_firing)
    }
}

/// A named group of scenarios that run side by side for comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    /// Pre-flight checks; nothing remote may happen before this passes
    pub fn validate(&self) -> Result<()> {
        if self.scenarios.is_empty() {
            return Err(AlertLoadError::config(format!(
                "suite {} has no scenarios",
                self.id
            )));
        }

        for scenario in &self.scenarios {
            if !(0..=100).contains(&scenario.percent_firing) {
                return Err(AlertLoadError::config(format!(
                    "scenario '{}': percent firing must be between 0 and 100, got {}",
                    scenario.name, scenario.percent_firing
                )));
            }
            if scenario.alert_interval.trim().is_empty() {
                return Err(AlertLoadError::config(format!(
                    "scenario '{}': alert interval cannot be empty",
                    scenario.name
                )));
            }
            scenario.deployment.normalized_sizes().map_err(|e| match e {
                AlertLoadError::Configuration(message) => {
                    AlertLoadError::config(format!("scenario '{}': {}", scenario.name, message))
                }
                other => other,
            })?;
        }

        Ok(())
    }

    /// Apply run-wide overrides coming from the command line
    pub fn with_overrides(mut self, overrides: &SuiteOverrides) -> Self {
        for scenario in &mut self.scenarios {
            if let Some(percent) = overrides.percent_firing {
                scenario.percent_firing = percent;
            }
            if let Some(ref stack) = overrides.stack {
                scenario.deployment.version = Some(stack.clone());
            }
            if let Some(ref template) = overrides.template {
                scenario.deployment.template = Some(template.clone());
            }
        }
        self
    }
}

/// Command line values that replace what the suite defines
#[derive(Debug, Clone, Default)]
pub struct SuiteOverrides {
    pub percent_firing: Option<i32>,
    pub stack: Option<String>,
    pub template: Option<String>,
}

/// Firing threshold: rule `index` fires iff `(index + 1) / total <= percent / 100`
pub fn is_firing(index: usize, total: usize, percent_firing: i32) -> bool {
    if total == 0 || percent_firing <= 0 {
        return false;
    }
    // (index + 1) * 100 <= percent * total, kept in integers
    (index as u64 + 1) * 100 <= percent_firing as u64 * total as u64
}

fn default_tm_max_workers() -> u32 {
    DEFAULT_TM_MAX_WORKERS
}

fn default_tm_poll_interval() -> u64 {
    DEFAULT_TM_POLL_INTERVAL_MS
}

fn default_alert_interval() -> String {
    "1m".to_string()
}
