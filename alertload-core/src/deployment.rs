//! Provisioned deployments

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::scenario::DeploymentSpec;

/// Name prefix of every deployment this tool creates; used to find leftovers
pub const INSTANCE_PREFIX: &str = "alertload-";

/// Which scenario a deployment was created for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRef {
    pub index: usize,
    pub name: String,
}

/// A healthy, provisioned deployment.
///
/// Values only exist once the health poll reported healthy. Not `Clone`:
/// teardown consumes the value, so every deployment is deleted at most once.
#[derive(Debug)]
pub struct Deployment {
    pub id: String,
    pub name: String,
    /// Elasticsearch endpoint with credentials embedded
    pub es_url: String,
    /// Kibana endpoint with credentials embedded
    pub kb_url: String,
    pub status: String,
    pub version: String,
    pub zone: String,
    pub scenario: ScenarioRef,
    pub spec: DeploymentSpec,
}

impl Deployment {
    /// Credential-free view for logs and reports
    pub fn summary(&self) -> DeploymentSummary {
        DeploymentSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            es_url: redact_credentials(&self.es_url),
            kb_url: redact_credentials(&self.kb_url),
            status: self.status.clone(),
            version: self.version.clone(),
            zone: self.zone.clone(),
            scenario: self.scenario.clone(),
            spec: self.spec.clone(),
        }
    }

    /// Number of Kibana instances the deployment was sized with
    pub fn kibana_instances(&self) -> usize {
        self.spec.kb.instances as usize
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -- {}",
            self.version, self.zone, self.name, self.status
        )
    }
}

/// Serializable deployment description without secrets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    pub id: String,
    pub name: String,
    pub es_url: String,
    pub kb_url: String,
    pub status: String,
    pub version: String,
    pub zone: String,
    pub scenario: ScenarioRef,
    pub spec: DeploymentSpec,
}

/// Replace `user:password@` in a URL with `***@`
pub fn redact_credentials(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let _ = parsed.set_password(None);
            let _ = parsed.set_username("***");
            parsed.to_string().trim_end_matches('/').to_string()
        }
        _ => raw.to_string(),
    }
}
