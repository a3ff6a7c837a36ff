//! Built-in benchmark suites and suite files

use alertload_core::{AlertLoadError, DeploymentSpec, ResourceSize, Result, Scenario, Suite};
use serde::Deserialize;
use std::path::Path;

/// Schedule interval of every built-in rule
pub const ALERT_INTERVAL: &str = "5s";

/// Stack versions compared by the `stack-versions-*` suites; the first is the default
pub const STACK_VERSIONS: [&str; 4] = ["7.14.0", "7.13.3", "7.12.1", "7.11.2"];

/// Rule counts every parameterized suite is generated for
pub const ALERT_COUNTS: [usize; 5] = [10, 50, 100, 200, 400];

/// Ordered set of suites addressable by id
#[derive(Debug, Clone, Default)]
pub struct SuiteCatalog {
    suites: Vec<Suite>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SuiteFile {
    Wrapped { suites: Vec<Suite> },
    List(Vec<Suite>),
}

impl SuiteCatalog {
    pub fn new(suites: Vec<Suite>) -> Self {
        Self { suites }
    }

    /// The suites shipped with the tool
    pub fn builtin() -> Self {
        let mut suites = Vec::new();
        for alerts in ALERT_COUNTS {
            suites.push(deployment_size_suite(alerts));
        }
        for alerts in ALERT_COUNTS {
            suites.push(tm_max_workers_suite(alerts));
        }
        for alerts in ALERT_COUNTS {
            suites.push(tm_poll_interval_suite(alerts));
        }
        for alerts in ALERT_COUNTS {
            suites.push(stack_versions_suite(alerts));
        }
        suites.push(number_of_alerts_suite());
        Self { suites }
    }

    /// Parse suites from YAML: either a list or a mapping with a `suites` key
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: SuiteFile = serde_yaml::from_str(content)
            .map_err(|e| AlertLoadError::config(format!("invalid suite file: {}", e)))?;
        let suites = match file {
            SuiteFile::Wrapped { suites } | SuiteFile::List(suites) => suites,
        };
        Ok(Self { suites })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AlertLoadError::config(format!("unable to read suite file {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Add `other`'s suites; a suite with an id already present replaces it
    pub fn merge(&mut self, other: SuiteCatalog) {
        for suite in other.suites {
            match self.suites.iter_mut().find(|s| s.id == suite.id) {
                Some(existing) => *existing = suite,
                None => self.suites.push(suite),
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Suite> {
        self.suites.iter().find(|suite| suite.id == id)
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    pub fn len(&self) -> usize {
        self.suites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}

fn scenario(name: String, alerts: usize, es: ResourceSize, kb: ResourceSize) -> Scenario {
    let mut deployment = DeploymentSpec::new(es, kb);
    deployment.version = Some(STACK_VERSIONS[0].to_string());
    Scenario {
        name,
        alerts,
        alert_interval: ALERT_INTERVAL.to_string(),
        percent_firing: 0,
        deployment,
    }
}

fn standard(name: String, alerts: usize) -> Scenario {
    scenario(name, alerts, ResourceSize::new(1, 8), ResourceSize::new(2, 8))
}

fn deployment_size_suite(alerts: usize) -> Suite {
    let sizes = [(8, 4), (15, 6), (29, 8), (58, 10)];
    let scenarios = sizes
        .into_iter()
        .map(|(es_gb, kb_instances)| {
            let es = ResourceSize::new(1, es_gb);
            let kb = ResourceSize::new(kb_instances, 8);
            scenario(format!("kb: {}; es: {}", kb, es), alerts, es, kb)
        })
        .collect();

    Suite {
        id: format!("deployment-size-{}", alerts),
        description: format!("vary scenarios by deployment size for {} alerts", alerts),
        scenarios,
    }
}

fn tm_max_workers_suite(alerts: usize) -> Suite {
    let scenarios = [10, 15, 20]
        .into_iter()
        .map(|workers| {
            let mut scenario = standard(format!("tm max workers: {}", workers), alerts);
            scenario.deployment.tm_max_workers = workers;
            scenario
        })
        .collect();

    Suite {
        id: format!("tm-max-workers-{}", alerts),
        description: format!("vary scenarios by TM max workers for {} alerts", alerts),
        scenarios,
    }
}

fn tm_poll_interval_suite(alerts: usize) -> Suite {
    let scenarios = [3000, 2000, 1000, 500]
        .into_iter()
        .map(|interval| {
            let mut scenario = standard(format!("tm poll interval: {}", interval), alerts);
            scenario.deployment.tm_poll_interval = interval;
            scenario
        })
        .collect();

    Suite {
        id: format!("tm-poll-interval-{}", alerts),
        description: format!("vary scenarios by TM poll interval for {} alerts", alerts),
        scenarios,
    }
}

fn stack_versions_suite(alerts: usize) -> Suite {
    let scenarios = STACK_VERSIONS
        .into_iter()
        .map(|version| {
            let mut scenario = standard(format!("stack version: {}", version), alerts);
            scenario.deployment.version = Some(version.to_string());
            scenario
        })
        .collect();

    Suite {
        id: format!("stack-versions-{}", alerts),
        description: format!("vary scenarios by stack version for {} alerts", alerts),
        scenarios,
    }
}

fn number_of_alerts_suite() -> Suite {
    let scenarios = ALERT_COUNTS[..4]
        .iter()
        .map(|&alerts| standard(format!("alerts: {}", alerts), alerts))
        .collect();

    Suite {
        id: "number-of-alerts".to_string(),
        description: "vary scenarios by number of alerts".to_string(),
        scenarios,
    }
}
