//! One benchmark session from validation to teardown

use crate::connector::{Connection, DeploymentConnector};
use crate::report::{ReportSink, RuleLoad, RunReport};
use crate::sampler::{SampleTarget, StatsSampler};
use alertload_config::AlertLoadConfig;
use alertload_core::telemetry::sort_by_date;
use alertload_core::{
    AlertLoadError, Deployment, LogRecord, Result, SampleSet, Scenario, ScenarioRef, Suite,
};
use alertload_deploy::DeploymentProvisioner;
use alertload_execution::{WorkQueue, WorkSummary};
use alertload_http::{KibanaApi, PaginatedFetcher, RuleRequest};
use alertload_resilience::RetryPolicy;
use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Short run identifier derived from the start time, e.g. `18-120000`
pub fn run_name(started_at: DateTime<Utc>) -> String {
    started_at.format("%d-%H%M%S").to_string()
}

/// Knobs of a run, resolved from configuration and command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// How long rules run before logs are collected
    pub duration: Duration,
    pub rule_concurrency: usize,
    pub rule_input_index: String,
    pub sample_interval: Duration,
    pub worker_retries_per_instance: usize,
    /// Delay between consecutive deployment submissions
    pub stagger: Duration,
    pub log_page_size: usize,
    pub stop_on_empty_page: bool,
    pub max_log_pages: Option<usize>,
    pub retry: RetryPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self::from_config(&AlertLoadConfig::default())
    }
}

impl RunSettings {
    pub fn from_config(config: &AlertLoadConfig) -> Self {
        Self {
            duration: config.run.duration(),
            rule_concurrency: config.run.rule_concurrency,
            rule_input_index: config.run.rule_input_index.clone(),
            sample_interval: config.run.sample_interval,
            worker_retries_per_instance: config.run.worker_retries_per_instance,
            stagger: config.provisioning.stagger,
            log_page_size: config.run.log_page_size,
            stop_on_empty_page: config.run.stop_on_empty_page,
            max_log_pages: config.run.max_log_pages,
            retry: RetryPolicy::new(config.retry.max_retries, config.retry.delay),
        }
    }

    /// Replace the run duration when `minutes` is given
    pub fn with_minutes(mut self, minutes: Option<u64>) -> Self {
        if let Some(minutes) = minutes {
            self.duration = Duration::from_secs(minutes * 60);
        }
        self
    }
}

/// What a finished run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_name: String,
    pub deployments: usize,
    pub rules: WorkSummary,
    pub sample_cycles: u64,
    pub samples: usize,
    pub log_records: usize,
    pub report_location: String,
    pub teardown_failures: usize,
    /// Deployments with the instance prefix still present after teardown
    pub leftovers: usize,
}

pub struct RunOrchestrator {
    provisioner: Arc<DeploymentProvisioner>,
    connector: Arc<dyn DeploymentConnector>,
    sink: Arc<dyn ReportSink>,
    settings: RunSettings,
}

impl RunOrchestrator {
    pub fn new(
        provisioner: Arc<DeploymentProvisioner>,
        connector: Arc<dyn DeploymentConnector>,
        sink: Arc<dyn ReportSink>,
        settings: RunSettings,
    ) -> Self {
        Self {
            provisioner,
            connector,
            sink,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run `suite` end to end.
    ///
    /// Only configuration and provisioning errors end a run early. Every
    /// deployment that became healthy is torn down before this returns,
    /// whatever happened after provisioning.
    pub async fn run(&self, suite: &Suite, run_name: &str) -> Result<RunSummary> {
        suite.validate()?;
        let started_at = Utc::now();
        info!(run = %run_name, suite = %suite.id, scenarios = suite.scenarios.len(), "starting run");

        self.report_leftovers("existing").await;

        let deployments = self.provision_all(suite, run_name).await?;

        let outcome = self.drive(suite, run_name, started_at, &deployments).await;

        let deployment_count = deployments.len();
        let teardown_failures = self.teardown_all(deployments).await;
        let leftovers = self.report_leftovers("remaining").await;

        let mut summary = outcome?;
        summary.deployments = deployment_count;
        summary.teardown_failures = teardown_failures;
        summary.leftovers = leftovers;

        info!(
            run = %run_name,
            rules_created = summary.rules.completed,
            rules_failed = summary.rules.failed,
            samples = summary.samples,
            log_records = summary.log_records,
            "run complete"
        );
        Ok(summary)
    }

    /// Provision every scenario concurrently, scenario `i` submitted after `i * stagger`
    async fn provision_all(&self, suite: &Suite, run_name: &str) -> Result<Vec<Deployment>> {
        let stagger = self.settings.stagger;

        let provisions = suite.scenarios.iter().enumerate().map(|(index, scenario)| async move {
            sleep(submission_delay(stagger, index)).await;
            let scenario_ref = ScenarioRef {
                index,
                name: scenario.name.clone(),
            };
            self.provisioner
                .provision(scenario_ref, run_name, &scenario.deployment)
                .await
        });

        match try_join_all(provisions).await {
            Ok(deployments) => {
                for deployment in &deployments {
                    let summary = deployment.summary();
                    info!(
                        deployment = %summary.name,
                        id = %summary.id,
                        es = %summary.es_url,
                        kb = %summary.kb_url,
                        "{}",
                        deployment
                    );
                }
                Ok(deployments)
            }
            Err(e) => {
                error!(error_code = e.error_code(), "{}", e);
                let created = self.provisioner.created().snapshot();
                if !created.is_empty() {
                    let names: Vec<String> = created
                        .iter()
                        .map(|d| format!("{} ({})", d.name, d.id))
                        .collect();
                    warn!(
                        "provisioning aborted; these deployments were created and must be deleted manually (alertload rmdall): {}",
                        names.join(", ")
                    );
                }
                Err(e)
            }
        }
    }

    /// Load, sample, collect and report
    async fn drive(
        &self,
        suite: &Suite,
        run_name: &str,
        started_at: DateTime<Utc>,
        deployments: &[Deployment],
    ) -> Result<RunSummary> {
        let connections = deployments
            .iter()
            .map(|deployment| {
                self.connector.connect(deployment).map_err(|e| {
                    AlertLoadError::provisioning(&deployment.name, format!("unusable endpoint: {}", e))
                })
            })
            .collect::<Result<Vec<Connection>>>()?;

        let samples = Arc::new(Mutex::new(SampleSet::new()));
        let targets = deployments
            .iter()
            .zip(&connections)
            .map(|(deployment, connection)| SampleTarget {
                deployment: deployment.name.clone(),
                kibana: connection.kibana.clone(),
                expected_workers: deployment.kibana_instances(),
            })
            .collect();
        let sampler = StatsSampler::new(
            targets,
            samples.clone(),
            self.settings.worker_retries_per_instance,
            self.settings.retry.clone(),
        )
        .start(self.settings.sample_interval);

        let loads = join_all(deployments.iter().zip(&connections).map(|(deployment, connection)| {
            let scenario = &suite.scenarios[deployment.scenario.index];
            self.create_rules(scenario, &deployment.name, connection.kibana.clone())
        }))
        .await;

        let mut rules = WorkSummary::default();
        for (_, summary) in &loads {
            rules.completed += summary.completed;
            rules.failed += summary.failed;
            rules.skipped += summary.skipped;
        }

        info!(run = %run_name, minutes = self.settings.duration.as_secs() / 60, "running");
        sleep(self.settings.duration).await;

        let sample_cycles = match sampler.cancel().await {
            Ok(cycles) => cycles,
            Err(e) => {
                warn!("stats sampler ended abnormally: {}", e);
                0
            }
        };
        let samples = std::mem::take(&mut *samples.lock().await);

        let event_log = self.collect_logs(deployments, &connections).await;

        let report = RunReport {
            run_name: run_name.to_string(),
            suite: suite.clone(),
            started_at,
            finished_at: Utc::now(),
            deployments: deployments.iter().map(Deployment::summary).collect(),
            rules: loads.into_iter().map(|(load, _)| load).collect(),
            event_log,
            samples,
        };

        let report_location = self.sink.deliver(&report).await?;

        Ok(RunSummary {
            run_name: run_name.to_string(),
            deployments: deployments.len(),
            rules,
            sample_cycles,
            samples: report.samples.len(),
            log_records: report.event_log.len(),
            report_location,
            teardown_failures: 0,
            leftovers: 0,
        })
    }

    /// Create the scenario's rules on one deployment; failures are only logged
    async fn create_rules(
        &self,
        scenario: &Scenario,
        deployment: &str,
        kibana: Arc<dyn KibanaApi>,
    ) -> (RuleLoad, WorkSummary) {
        let queue = WorkQueue::new(self.settings.rule_concurrency)
            .with_label(format!("creating rules on {}", deployment));
        let input_index = self.settings.rule_input_index.as_str();

        let results = queue
            .run((0..scenario.alerts).collect(), |index: usize, _| {
                let rule = RuleRequest::index_threshold(
                    &format!("{:04}", index),
                    &scenario.alert_interval,
                    scenario.is_firing(index),
                    input_index,
                );
                let kibana = kibana.clone();
                async move {
                    kibana
                        .create_rule(&rule)
                        .await
                        .map_err(|e| AlertLoadError::PartialCreation {
                            deployment: deployment.to_string(),
                            index,
                            message: e.to_string(),
                        })
                }
            })
            .await;

        let summary = WorkSummary::of(&results);
        let firing = (0..scenario.alerts).filter(|&i| scenario.is_firing(i)).count();
        info!(
            deployment = %deployment,
            created = summary.completed,
            failed = summary.failed,
            firing,
            "rules created"
        );

        let load = RuleLoad {
            deployment: deployment.to_string(),
            requested: scenario.alerts,
            created: summary.completed,
            failed: summary.failed,
            firing,
        };
        (load, summary)
    }

    /// Read every deployment's event log in turn and merge by date
    async fn collect_logs(
        &self,
        deployments: &[Deployment],
        connections: &[Connection],
    ) -> Vec<LogRecord> {
        let fetcher = PaginatedFetcher::new(self.settings.retry.clone())
            .stop_on_empty_page(self.settings.stop_on_empty_page)
            .max_pages(self.settings.max_log_pages);

        let mut records = Vec::new();
        for (deployment, connection) in deployments.iter().zip(connections) {
            match fetcher
                .fetch_all(connection.event_log.as_ref(), self.settings.log_page_size)
                .await
            {
                Ok(mut fetched) => {
                    info!(deployment = %deployment.name, records = fetched.len(), "event log read");
                    records.append(&mut fetched);
                }
                Err(e) => {
                    let error = AlertLoadError::TransientRemote(format!(
                        "event log of {}: {}",
                        deployment.name, e
                    ));
                    warn!(deployment = %deployment.name, error_code = error.error_code(), "{}", error);
                }
            }
        }

        sort_by_date(&mut records);
        records
    }

    /// Delete every deployment in parallel; returns the number of failures
    async fn teardown_all(&self, deployments: Vec<Deployment>) -> usize {
        if deployments.is_empty() {
            return 0;
        }
        info!(count = deployments.len(), "deleting deployments");

        let results = join_all(
            deployments
                .into_iter()
                .map(|deployment| self.provisioner.teardown(deployment)),
        )
        .await;

        let mut failures = 0;
        for error in results.into_iter().filter_map(|result| result.err()) {
            failures += 1;
            warn!(error_code = error.error_code(), "{}", error);
        }
        failures
    }

    /// Log leftover deployments; a listing failure is logged and counts as zero
    async fn report_leftovers(&self, which: &str) -> usize {
        match self.provisioner.list_leftovers().await {
            Ok(leftovers) => {
                for leftover in &leftovers {
                    info!(deployment = %leftover.name, id = %leftover.id, "{} deployment", which);
                }
                leftovers.len()
            }
            Err(e) => {
                warn!("unable to list deployments: {}", e);
                0
            }
        }
    }
}

/// Offset of the `index`th submission, capped at `Duration::MAX`
fn submission_delay(stagger: Duration, index: usize) -> Duration {
    let index = u32::try_from(index).unwrap_or(u32::MAX);
    stagger.checked_mul(index).unwrap_or(Duration::MAX)
}
