//! End-to-end runs against in-memory backends

use alertload_core::{
    AlertLoadError, Deployment, DeploymentSpec, LogRecord, ResourceSize, Result as RunResult,
    Scenario, Suite,
};
use alertload_deploy::{
    BackendError, CreateRequest, CreatedDeployment, DeploymentProvisioner, DeploymentStatus,
    ListedDeployment, ProvisionerSettings, ProvisioningBackend, ResourceInfo,
};
use alertload_http::{
    HttpError, KibanaApi, KibanaStatus, Page, PageSource, RuleRequest, TaskManagerHealth,
};
use alertload_resilience::RetryPolicy;
use alertload_runner::{
    Connection, DeploymentConnector, ReportSink, RunOrchestrator, RunReport, RunSettings,
};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct CloudBackend {
    live: Mutex<Vec<ListedDeployment>>,
    deleted: Mutex<Vec<String>>,
    calls: AtomicUsize,
    reject_create_of: Option<usize>,
    reject_delete: bool,
}

#[async_trait]
impl ProvisioningBackend for CloudBackend {
    async fn create(&self, request: &CreateRequest) -> Result<CreatedDeployment, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(index) = self.reject_create_of {
            if request.deployment_name.contains(&format!("-{}-e", index)) {
                return Err(BackendError::unexpected("capacity exhausted"));
            }
        }
        let id = format!("id-{}", self.live.lock().unwrap().len());
        self.live.lock().unwrap().push(ListedDeployment {
            id: id.clone(),
            name: request.deployment_name.clone(),
        });
        Ok(CreatedDeployment {
            id,
            username: "elastic".to_string(),
            password: "pw".to_string(),
        })
    }

    async fn get_status(&self, id: &str, _name: &str) -> Result<DeploymentStatus, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let info = |subsystem: &str| ResourceInfo {
            healthy: true,
            status: "started".to_string(),
            endpoint: Some(format!("{}.{}.example.com", id, subsystem)),
            port: Some(9243),
            version: "7.14.0".to_string(),
            zone: "us-west2-a".to_string(),
        };
        Ok(DeploymentStatus {
            elasticsearch: info("es"),
            kibana: info("kb"),
        })
    }

    async fn delete(&self, id: &str, _name: &str) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_delete {
            return Err(BackendError::unexpected("delete rejected"));
        }
        self.live.lock().unwrap().retain(|d| d.id != id);
        self.deleted.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ListedDeployment>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.live.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct FakeKibana {
    rules: Mutex<Vec<RuleRequest>>,
}

#[async_trait]
impl KibanaApi for FakeKibana {
    async fn status(&self) -> Result<KibanaStatus, HttpError> {
        Ok(serde_json::from_value(json!({ "uuid": "kb-0" })).unwrap())
    }

    async fn task_manager_health(&self) -> Result<TaskManagerHealth, HttpError> {
        Ok(serde_json::from_value(json!({ "id": "kb-0", "status": "OK" })).unwrap())
    }

    async fn create_rule(&self, rule: &RuleRequest) -> Result<String, HttpError> {
        if rule.name == "0005" {
            return Err(HttpError::Status {
                status: 400,
                url: "/api/alerts/alert".to_string(),
                body: "bad request".to_string(),
            });
        }
        self.rules.lock().unwrap().push(rule.clone());
        Ok(format!("rule-{}", rule.name))
    }
}

/// Three pages per deployment: two records, one record, then an empty page
struct FakeEventLog {
    deployment: String,
    offset: u32,
    released: Arc<Mutex<Vec<String>>>,
}

impl FakeEventLog {
    fn record(&self, second: u32) -> LogRecord {
        LogRecord {
            deployment: self.deployment.clone(),
            provider: "alerting".to_string(),
            date: Utc.with_ymd_and_hms(2021, 7, 1, 12, 0, self.offset + second).unwrap(),
            duration_ms: 5,
            outcome: Some("success".to_string()),
            rule_id: None,
            action_id: None,
        }
    }
}

#[async_trait]
impl PageSource for FakeEventLog {
    type Item = LogRecord;

    async fn first_page(&self, _page_size: usize) -> Result<Page<LogRecord>, HttpError> {
        Ok(Page::new(
            vec![self.record(10), self.record(30)],
            Some("t1".to_string()),
        ))
    }

    async fn next_page(&self, token: &str) -> Result<Page<LogRecord>, HttpError> {
        match token {
            "t1" => Ok(Page::new(vec![self.record(50)], Some("t2".to_string()))),
            _ => Ok(Page::new(Vec::new(), Some("t3".to_string()))),
        }
    }

    async fn release(&self, token: &str) -> Result<(), HttpError> {
        self.released.lock().unwrap().push(token.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct FakeConnector {
    kibanas: Mutex<Vec<Arc<FakeKibana>>>,
    released: Arc<Mutex<Vec<String>>>,
}

impl DeploymentConnector for FakeConnector {
    fn connect(&self, deployment: &Deployment) -> Result<Connection, HttpError> {
        let kibana = Arc::new(FakeKibana::default());
        self.kibanas.lock().unwrap().push(kibana.clone());
        Ok(Connection {
            kibana,
            event_log: Box::new(FakeEventLog {
                deployment: deployment.name.clone(),
                offset: deployment.scenario.index as u32 * 5,
                released: self.released.clone(),
            }),
        })
    }
}

#[derive(Default)]
struct MemorySink {
    reports: Mutex<Vec<RunReport>>,
    fail: bool,
}

#[async_trait]
impl ReportSink for MemorySink {
    async fn deliver(&self, report: &RunReport) -> RunResult<String> {
        if self.fail {
            return Err(AlertLoadError::Report("disk full".to_string()));
        }
        self.reports.lock().unwrap().push(report.clone());
        Ok("memory".to_string())
    }
}

fn scenario(name: &str, alerts: usize, percent_firing: i32) -> Scenario {
    Scenario {
        name: name.to_string(),
        alerts,
        alert_interval: "5s".to_string(),
        percent_firing,
        deployment: DeploymentSpec::new(ResourceSize::new(1, 8), ResourceSize::new(1, 1)),
    }
}

fn suite(scenarios: Vec<Scenario>) -> Suite {
    Suite {
        id: "test".to_string(),
        description: String::new(),
        scenarios,
    }
}

fn settings() -> RunSettings {
    RunSettings {
        duration: Duration::from_secs(65),
        rule_concurrency: 3,
        sample_interval: Duration::from_secs(10),
        stagger: Duration::from_secs(2),
        retry: RetryPolicy::new(1, Duration::from_secs(1)),
        ..RunSettings::default()
    }
}

struct Harness {
    backend: Arc<CloudBackend>,
    connector: Arc<FakeConnector>,
    sink: Arc<MemorySink>,
    orchestrator: RunOrchestrator,
}

fn harness(backend: CloudBackend, sink: MemorySink) -> Harness {
    let backend = Arc::new(backend);
    let connector = Arc::new(FakeConnector::default());
    let sink = Arc::new(sink);
    let provisioner = DeploymentProvisioner::new(
        backend.clone(),
        ProvisionerSettings {
            poll_interval: Duration::from_secs(10),
            wait_budget: Duration::from_secs(60),
            retry: RetryPolicy::new(1, Duration::from_secs(1)),
        },
    );
    let orchestrator = RunOrchestrator::new(
        Arc::new(provisioner),
        connector.clone(),
        sink.clone(),
        settings(),
    );
    Harness {
        backend,
        connector,
        sink,
        orchestrator,
    }
}

#[tokio::test(start_paused = true)]
async fn test_full_run_collects_and_tears_down() {
    let h = harness(CloudBackend::default(), MemorySink::default());
    let suite = suite(vec![scenario("first", 10, 30), scenario("second", 10, 0)]);

    let summary = h.orchestrator.run(&suite, "08-090503").await.unwrap();

    assert_eq!(summary.deployments, 2);
    assert_eq!(summary.rules.completed, 18);
    assert_eq!(summary.rules.failed, 2);
    assert_eq!(summary.rules.attempted(), 20);
    assert_eq!(summary.sample_cycles, 6);
    assert_eq!(summary.log_records, 6);
    assert_eq!(summary.teardown_failures, 0);
    assert_eq!(summary.leftovers, 0);

    // firing share follows the index threshold
    let kibanas = h.connector.kibanas.lock().unwrap();
    let firing = kibanas[0].rules.lock().unwrap().iter().filter(|r| r.is_firing()).count();
    assert_eq!(firing, 3);
    assert!(kibanas[1].rules.lock().unwrap().iter().all(|r| !r.is_firing()));

    let reports = h.sink.reports.lock().unwrap();
    let report = &reports[0];
    assert_eq!(report.run_name, "08-090503");
    assert_eq!(report.deployments[0].name, "alertload-08-090503-0-e8-k1");
    assert!(!report.deployments[0].es_url.contains("pw"));
    assert!(report.event_log.windows(2).all(|w| w[0].date <= w[1].date));
    let order: Vec<&str> = report
        .event_log
        .iter()
        .map(|r| r.deployment.as_str())
        .collect();
    assert_eq!(order[..2], ["alertload-08-090503-0-e8-k1", "alertload-08-090503-1-e8-k1"]);
    // one status and one task manager record per deployment and cycle
    assert_eq!(report.samples.len(), 6 * 2 * 2);
    assert_eq!(report.rules[0].firing, 3);

    assert_eq!(h.backend.deleted.lock().unwrap().len(), 2);
    assert_eq!(*h.connector.released.lock().unwrap(), vec!["t3", "t3"]);
}

#[tokio::test]
async fn test_invalid_suite_makes_no_remote_calls() {
    let h = harness(CloudBackend::default(), MemorySink::default());

    let err = h
        .orchestrator
        .run(&suite(vec![scenario("bad", 10, 101)]), "run")
        .await
        .unwrap_err();

    assert!(matches!(err, AlertLoadError::Configuration(_)));
    assert_eq!(h.backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_provisioning_failure_aborts_without_rollback() {
    let h = harness(
        CloudBackend {
            reject_create_of: Some(1),
            ..CloudBackend::default()
        },
        MemorySink::default(),
    );
    let suite = suite(vec![scenario("ok", 1, 0), scenario("rejected", 1, 0)]);

    let err = h.orchestrator.run(&suite, "run").await.unwrap_err();

    assert!(matches!(err, AlertLoadError::Provisioning { .. }));
    assert!(h.sink.reports.lock().unwrap().is_empty());
    // the healthy sibling is left for the operator
    assert!(h.backend.deleted.lock().unwrap().is_empty());
    assert_eq!(h.backend.live.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_report_failure_still_tears_down() {
    let h = harness(
        CloudBackend::default(),
        MemorySink {
            fail: true,
            ..MemorySink::default()
        },
    );

    let err = h
        .orchestrator
        .run(&suite(vec![scenario("only", 2, 50)]), "run")
        .await
        .unwrap_err();

    assert!(matches!(err, AlertLoadError::Report(_)));
    assert_eq!(h.backend.deleted.lock().unwrap().len(), 1);
    assert!(h.backend.live.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_teardown_failures_are_counted_not_fatal() {
    let h = harness(
        CloudBackend {
            reject_delete: true,
            ..CloudBackend::default()
        },
        MemorySink::default(),
    );

    let summary = h
        .orchestrator
        .run(&suite(vec![scenario("a", 1, 0), scenario("b", 1, 0)]), "run")
        .await
        .unwrap();

    assert_eq!(summary.teardown_failures, 2);
    assert_eq!(summary.leftovers, 2);
}
