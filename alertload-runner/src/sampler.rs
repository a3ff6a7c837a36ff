//! Telemetry sample cycles
//!
//! One cycle walks the deployments in order. For each it reads the Kibana
//! status document and the task manager health of every Kibana instance,
//! then appends the batch to the shared [`SampleSet`] under a single lock.
//! A deployment that cannot be read is logged and skipped.

use alertload_core::{AlertLoadError, SampleSet, TaskManagerSample};
use alertload_execution::{PeriodicSampler, SamplerHandle};
use alertload_http::KibanaApi;
use alertload_resilience::{RetryExecutor, RetryPolicy};
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A deployment as seen by the sampler
#[derive(Clone)]
pub struct SampleTarget {
    pub deployment: String,
    pub kibana: Arc<dyn KibanaApi>,
    /// Number of Kibana instances the deployment was sized with
    pub expected_workers: usize,
}

fn partial_sample(deployment: &str, what: &str, error: impl Display) {
    let error = AlertLoadError::PartialSample {
        deployment: deployment.to_string(),
        message: format!("{}: {}", what, error),
    };
    warn!(deployment = %deployment, error_code = error.error_code(), "{}", error);
}

/// Task manager worker ids observed per deployment across ticks
#[derive(Debug, Default)]
pub struct WorkerRoster {
    known: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl WorkerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `observed` and return the known workers missing from it
    pub async fn reconcile(&self, deployment: &str, observed: &[String]) -> Vec<String> {
        let mut known = self.known.lock().await;
        let workers = known.entry(deployment.to_string()).or_default();

        let missing = workers
            .iter()
            .filter(|id| !observed.contains(id))
            .cloned()
            .collect();
        workers.extend(observed.iter().cloned());
        missing
    }

    pub async fn known(&self, deployment: &str) -> Vec<String> {
        self.known
            .lock()
            .await
            .get(deployment)
            .map(|workers| workers.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Reads task manager health until every expected Kibana instance answered.
///
/// The health endpoint is served by whichever instance the load balancer
/// picks, so one tick polls up to `retries_per_worker * expected` times and
/// keeps the first reading of each instance.
#[derive(Debug)]
pub struct WorkerSampler {
    retries_per_worker: usize,
    roster: WorkerRoster,
}

impl WorkerSampler {
    pub fn new(retries_per_worker: usize) -> Self {
        Self {
            retries_per_worker: retries_per_worker.max(1),
            roster: WorkerRoster::new(),
        }
    }

    pub fn roster(&self) -> &WorkerRoster {
        &self.roster
    }

    pub async fn sample(&self, target: &SampleTarget) -> Vec<TaskManagerSample> {
        let expected = target.expected_workers.max(1);
        let max_fetches = self.retries_per_worker * expected;

        let mut samples: Vec<TaskManagerSample> = Vec::with_capacity(expected);
        let mut failures = 0;
        let mut fetches = 0;

        while fetches < max_fetches && samples.len() < expected {
            fetches += 1;
            match target.kibana.task_manager_health().await {
                Ok(health) => {
                    if samples.iter().all(|sample| sample.instance != health.id) {
                        samples.push(health.into_sample(&target.deployment, Utc::now()));
                    }
                }
                Err(e) => {
                    failures += 1;
                    debug!(deployment = %target.deployment, "task manager health: {}", e);
                }
            }
        }

        if samples.is_empty() && failures > 0 {
            partial_sample(
                &target.deployment,
                "task manager health",
                format!("{} fetch(es) failed", failures),
            );
        }

        let observed: Vec<String> = samples.iter().map(|s| s.instance.clone()).collect();
        let missing = self.roster.reconcile(&target.deployment, &observed).await;

        if samples.len() < expected {
            warn!(
                deployment = %target.deployment,
                expected,
                observed = samples.len(),
                fetches,
                "not every task manager worker answered; missing known workers: {:?}",
                missing
            );
        }

        samples
    }
}

/// Telemetry sampler over a fixed set of deployments
pub struct StatsSampler {
    targets: Vec<SampleTarget>,
    samples: Arc<Mutex<SampleSet>>,
    workers: WorkerSampler,
    retry: RetryExecutor,
}

impl StatsSampler {
    pub fn new(
        targets: Vec<SampleTarget>,
        samples: Arc<Mutex<SampleSet>>,
        retries_per_worker: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            targets,
            samples,
            workers: WorkerSampler::new(retries_per_worker),
            retry: RetryExecutor::new(retry),
        }
    }

    /// One pass over every deployment, in order
    pub async fn sample_cycle(&self) {
        for target in &self.targets {
            let mut batch = self.sample_deployment(target).await;
            debug!(deployment = %target.deployment, records = batch.len(), "sampled");

            // a deployment's batch lands in one lock hold
            self.samples.lock().await.append(&mut batch);
        }
    }

    async fn sample_deployment(&self, target: &SampleTarget) -> SampleSet {
        let mut batch = SampleSet::new();

        let label = format!("getting kibana status of {}", target.deployment);
        match self.retry.execute(&label, || target.kibana.status()).await {
            Ok(status) => batch
                .kibana_status
                .push(status.into_sample(&target.deployment, Utc::now())),
            Err(e) => partial_sample(&target.deployment, "kibana status", e),
        }

        batch.task_manager = self.workers.sample(target).await;
        batch
    }

    /// Run [`sample_cycle`](Self::sample_cycle) every `interval` in the background
    pub fn start(self, interval: Duration) -> SamplerHandle {
        let sampler = Arc::new(self);
        PeriodicSampler::start_named(
            "stats",
            move || {
                let sampler = sampler.clone();
                async move { sampler.sample_cycle().await }
            },
            interval,
        )
    }
}
