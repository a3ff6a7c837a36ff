//! Deployment lifecycle: size checks, creation, health polling, teardown

use crate::backend::{
    CreateRequest, CreatedDeployment, DeploymentStatus, ListedDeployment, ProvisioningBackend,
};
use alertload_config::{ProvisioningConfig, RetryConfig};
use alertload_core::{
    AlertLoadError, Deployment, DeploymentSpec, Result, ScenarioRef, INSTANCE_PREFIX,
};
use alertload_resilience::{RetryExecutor, RetryPolicy};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Where a deployment is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    Requested,
    Creating,
    Polling,
    Healthy,
    TimedOut,
    Failed,
    Deleted,
}

impl ProvisionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionState::Requested => "requested",
            ProvisionState::Creating => "creating",
            ProvisionState::Polling => "polling",
            ProvisionState::Healthy => "healthy",
            ProvisionState::TimedOut => "timed_out",
            ProvisionState::Failed => "failed",
            ProvisionState::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing knobs of the provisioner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerSettings {
    pub poll_interval: Duration,
    pub wait_budget: Duration,
    pub retry: RetryPolicy,
}

impl Default for ProvisionerSettings {
    fn default() -> Self {
        Self::from_config(&ProvisioningConfig::default(), &RetryConfig::default())
    }
}

impl ProvisionerSettings {
    pub fn from_config(provisioning: &ProvisioningConfig, retry: &RetryConfig) -> Self {
        Self {
            poll_interval: provisioning.poll_interval,
            wait_budget: provisioning.wait_budget,
            retry: RetryPolicy::new(retry.max_retries, retry.delay),
        }
    }
}

/// Every deployment accepted by the backend during this process.
///
/// Clones share the same list, so the orchestrator can still name what was
/// created after a provisioning future has been dropped.
#[derive(Debug, Clone, Default)]
pub struct CreatedDeployments {
    inner: Arc<Mutex<Vec<ListedDeployment>>>,
}

impl CreatedDeployments {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, id: &str, name: &str) {
        if let Ok(mut created) = self.inner.lock() {
            created.push(ListedDeployment {
                id: id.to_string(),
                name: name.to_string(),
            });
        }
    }

    fn forget(&self, id: &str) {
        if let Ok(mut created) = self.inner.lock() {
            created.retain(|deployment| deployment.id != id);
        }
    }

    /// Deployments created and not yet deleted
    pub fn snapshot(&self) -> Vec<ListedDeployment> {
        self.inner
            .lock()
            .map(|created| created.clone())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

pub struct DeploymentProvisioner {
    backend: Arc<dyn ProvisioningBackend>,
    settings: ProvisionerSettings,
    retry: RetryExecutor,
    created: CreatedDeployments,
}

impl DeploymentProvisioner {
    pub fn new(backend: Arc<dyn ProvisioningBackend>, settings: ProvisionerSettings) -> Self {
        let retry = RetryExecutor::new(settings.retry.clone());
        Self {
            backend,
            settings,
            retry,
            created: CreatedDeployments::new(),
        }
    }

    pub fn settings(&self) -> &ProvisionerSettings {
        &self.settings
    }

    /// Ledger of deployments this provisioner created
    pub fn created(&self) -> CreatedDeployments {
        self.created.clone()
    }

    /// Deployment name for scenario `index` of run `run_name`
    pub fn deployment_name(run_name: &str, index: usize, es_gb: u32, kb_gb: u32) -> String {
        format!(
            "{}{}-{}-e{}-k{}",
            INSTANCE_PREFIX, run_name, index, es_gb, kb_gb
        )
    }

    /// Create a deployment for `scenario` and wait until it is healthy.
    ///
    /// Sizes are checked before anything is sent to the backend.
    pub async fn provision(
        &self,
        scenario: ScenarioRef,
        run_name: &str,
        spec: &DeploymentSpec,
    ) -> Result<Deployment> {
        let (es_gb, kb_gb) = spec.normalized_sizes()?;
        let name = Self::deployment_name(run_name, scenario.index, es_gb, kb_gb);
        transition(&name, ProvisionState::Requested);

        let request = CreateRequest {
            deployment_name: name.clone(),
            spec: spec.clone(),
            es_memory_gb: es_gb,
            kb_memory_gb: kb_gb,
        };

        transition(&name, ProvisionState::Creating);
        let created = self
            .retry
            .execute(&format!("creating deployment {}", name), || {
                self.backend.create(&request)
            })
            .await
            .map_err(|e| {
                transition(&name, ProvisionState::Failed);
                AlertLoadError::provisioning(&name, e)
            })?;

        self.created.record(&created.id, &name);
        info!(deployment = %name, id = %created.id, "deployment created");

        transition(&name, ProvisionState::Polling);
        let status = self.wait_healthy(&created.id, &name).await?;

        transition(&name, ProvisionState::Healthy);
        compose(created, name, status, scenario, spec)
    }

    /// Poll at 0, interval, 2 * interval, ... until healthy or out of budget
    async fn wait_healthy(&self, id: &str, name: &str) -> Result<DeploymentStatus> {
        let budget = self.settings.wait_budget;
        let interval = self.settings.poll_interval;
        let started = Instant::now();

        if budget.is_zero() {
            return Err(timed_out(name, budget));
        }

        loop {
            let label = format!("getting deployment {} {}", id, name);
            let status = self
                .retry
                .execute(&label, || self.backend.get_status(id, name))
                .await
                .map_err(|e| {
                    transition(name, ProvisionState::Failed);
                    AlertLoadError::provisioning(name, e)
                })?;

            if status.is_healthy() {
                return Ok(status);
            }

            let elapsed = started.elapsed();
            let remaining = budget.saturating_sub(elapsed);
            info!(
                deployment = %name,
                remaining_secs = remaining.as_secs(),
                "{}",
                status.summary()
            );

            if remaining <= interval {
                return Err(timed_out(name, budget));
            }
            sleep(interval).await;
        }
    }

    /// Delete a deployment. Not retried; the caller logs a failure.
    pub async fn teardown(&self, deployment: Deployment) -> Result<()> {
        let Deployment { id, name, .. } = deployment;
        debug!(deployment = %name, id = %id, "deleting deployment");

        self.backend.delete(&id, &name).await.map_err(|e| {
            AlertLoadError::Teardown {
                deployment: name.clone(),
                message: e.to_string(),
            }
        })?;

        self.created.forget(&id);
        transition(&name, ProvisionState::Deleted);
        Ok(())
    }

    /// Deployments whose name carries the instance prefix
    pub async fn list_leftovers(&self) -> Result<Vec<ListedDeployment>> {
        let listed = self
            .retry
            .execute("listing deployments", || self.backend.list())
            .await
            .map_err(|e| AlertLoadError::TransientRemote(e.to_string()))?;

        Ok(listed
            .into_iter()
            .filter(|deployment| deployment.name.starts_with(INSTANCE_PREFIX))
            .collect())
    }

    /// Delete every leftover deployment, best-effort; returns how many were deleted
    pub async fn delete_leftovers(&self) -> Result<usize> {
        let leftovers = self.list_leftovers().await?;
        let mut deleted = 0;

        for leftover in leftovers {
            info!(deployment = %leftover.name, id = %leftover.id, "deleting leftover deployment");
            match self.backend.delete(&leftover.id, &leftover.name).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!(deployment = %leftover.name, "error deleting deployment: {}", e),
            }
        }

        Ok(deleted)
    }
}

fn transition(name: &str, state: ProvisionState) {
    info!(deployment = %name, state = %state, "deployment state");
}

fn timed_out(name: &str, budget: Duration) -> AlertLoadError {
    transition(name, ProvisionState::TimedOut);
    AlertLoadError::provisioning(
        name,
        format!("not healthy within {}s", budget.as_secs()),
    )
}

fn compose(
    created: CreatedDeployment,
    name: String,
    status: DeploymentStatus,
    scenario: ScenarioRef,
    spec: &DeploymentSpec,
) -> Result<Deployment> {
    let url = |subsystem: &str, endpoint: &Option<String>, port: Option<u16>| -> Result<String> {
        let host = endpoint.as_deref().ok_or_else(|| {
            AlertLoadError::provisioning(&name, format!("no {} endpoint reported", subsystem))
        })?;
        let port = port.ok_or_else(|| {
            AlertLoadError::provisioning(&name, format!("no {} https port reported", subsystem))
        })?;
        Ok(format!(
            "https://{}:{}@{}:{}",
            created.username, created.password, host, port
        ))
    };

    let es_url = url("elasticsearch", &status.elasticsearch.endpoint, status.elasticsearch.port)?;
    let kb_url = url("kibana", &status.kibana.endpoint, status.kibana.port)?;

    Ok(Deployment {
        id: created.id.clone(),
        status: status.summary(),
        version: status.elasticsearch.version.clone(),
        zone: status.elasticsearch.zone.clone(),
        name,
        es_url,
        kb_url,
        scenario,
        spec: spec.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_name_carries_prefix() {
        let name = DeploymentProvisioner::deployment_name("18120000", 2, 8, 16);
        assert_eq!(name, "alertload-18120000-2-e8-k16");
        assert!(name.starts_with(INSTANCE_PREFIX));
    }

    #[test]
    fn test_ledger_clones_share_state() {
        let ledger = CreatedDeployments::new();
        let other = ledger.clone();
        ledger.record("1", "alertload-a");
        ledger.record("2", "alertload-b");
        other.forget("1");
        assert_eq!(ledger.snapshot().len(), 1);
        assert_eq!(ledger.snapshot()[0].name, "alertload-b");
    }

    #[test]
    fn test_settings_from_config() {
        let settings = ProvisionerSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_secs(10));
        assert_eq!(settings.wait_budget, Duration::from_secs(600));
        assert_eq!(settings.retry.max_retries, 3);
    }
}
