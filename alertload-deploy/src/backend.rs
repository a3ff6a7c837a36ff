//! Provisioning backend abstraction

use crate::error::BackendError;
use alertload_core::DeploymentSpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Everything a backend needs to create one deployment
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Full deployment name, instance prefix included
    pub deployment_name: String,
    pub spec: DeploymentSpec,
    /// Total Elasticsearch memory in GB, already checked against the menu
    pub es_memory_gb: u32,
    /// Total Kibana memory in GB, already checked against the menu
    pub kb_memory_gb: u32,
}

/// Identity and credentials of a deployment the backend accepted
#[derive(Clone, PartialEq, Eq)]
pub struct CreatedDeployment {
    pub id: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for CreatedDeployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreatedDeployment")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// State of one subsystem of a deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub healthy: bool,
    pub status: String,
    pub endpoint: Option<String>,
    pub port: Option<u16>,
    pub version: String,
    pub zone: String,
}

impl ResourceInfo {
    /// Healthy and started
    pub fn is_ready(&self) -> bool {
        self.healthy && self.status == "started"
    }

    fn describe(&self) -> String {
        let health = if self.healthy { "healthy" } else { "unhealthy" };
        format!("{}: {}", health, self.status)
    }
}

/// Health poll result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentStatus {
    pub elasticsearch: ResourceInfo,
    pub kibana: ResourceInfo,
}

impl DeploymentStatus {
    /// Both subsystems healthy and started
    pub fn is_healthy(&self) -> bool {
        self.elasticsearch.is_ready() && self.kibana.is_ready()
    }

    /// One-line summary, e.g. `es: healthy: started; kb: unhealthy: initializing`
    pub fn summary(&self) -> String {
        format!(
            "es: {}; kb: {}",
            self.elasticsearch.describe(),
            self.kibana.describe()
        )
    }
}

/// A deployment as returned by the backend's list call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedDeployment {
    pub id: String,
    pub name: String,
}

/// Cloud provider operations the provisioner relies on
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    async fn create(&self, request: &CreateRequest) -> Result<CreatedDeployment, BackendError>;

    async fn get_status(&self, id: &str, name: &str) -> Result<DeploymentStatus, BackendError>;

    async fn delete(&self, id: &str, name: &str) -> Result<(), BackendError>;

    async fn list(&self) -> Result<Vec<ListedDeployment>, BackendError>;
}
