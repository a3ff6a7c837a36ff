//! Kibana client: status, task manager health and rule creation

use crate::client::{Endpoint, HttpManager};
use crate::errors::HttpError;
use alertload_core::{KibanaStatusSample, TaskManagerSample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

/// Rule type every load rule is created with
pub const INDEX_THRESHOLD_RULE_TYPE: &str = ".index-threshold";

const XSRF_HEADER: &str = "kbn-xsrf";

/// Kibana operations used during a run
#[async_trait]
pub trait KibanaApi: Send + Sync {
    /// `GET /api/status`
    async fn status(&self) -> Result<KibanaStatus, HttpError>;

    /// `GET /api/task_manager/_health`, answered by whichever instance the
    /// load balancer picks
    async fn task_manager_health(&self) -> Result<TaskManagerHealth, HttpError>;

    /// `POST /api/alerts/alert`; returns the new rule id
    async fn create_rule(&self, rule: &RuleRequest) -> Result<String, HttpError>;
}

/// Kibana HTTP client for one deployment
#[derive(Debug, Clone)]
pub struct KibanaClient {
    http: HttpManager,
    endpoint: Endpoint,
}

impl KibanaClient {
    pub fn new(http: HttpManager, kb_url: &str) -> Result<Self, HttpError> {
        Ok(Self {
            http,
            endpoint: Endpoint::parse(kb_url)?,
        })
    }

    fn xsrf_value() -> String {
        format!("alertload@{}", env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl KibanaApi for KibanaClient {
    async fn status(&self) -> Result<KibanaStatus, HttpError> {
        let request = self
            .http
            .request(Method::GET, &self.endpoint, "/api/status")?;
        self.http.send_json(request).await
    }

    async fn task_manager_health(&self) -> Result<TaskManagerHealth, HttpError> {
        let request = self
            .http
            .request(Method::GET, &self.endpoint, "/api/task_manager/_health")?;
        self.http.send_json(request).await
    }

    async fn create_rule(&self, rule: &RuleRequest) -> Result<String, HttpError> {
        let request = self
            .http
            .request(Method::POST, &self.endpoint, "/api/alerts/alert")?
            .header(XSRF_HEADER, Self::xsrf_value())
            .json(rule);

        let created: CreatedRule = self.http.send_json(request).await?;
        let id = created
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| HttpError::Unexpected("rule created without an id".to_string()))?;

        debug!("created rule {} ({})", rule.name, id);
        Ok(id)
    }
}

#[derive(Debug, Deserialize)]
struct CreatedRule {
    #[serde(default)]
    id: Option<String>,
}

/// Body of a rule creation request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRequest {
    pub enabled: bool,
    pub name: String,
    pub alert_type_id: String,
    pub consumer: String,
    pub schedule: RuleSchedule,
    pub throttle: Option<String>,
    pub actions: Vec<JsonValue>,
    pub params: JsonValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSchedule {
    pub interval: String,
}

impl RuleRequest {
    /// An index threshold rule counting documents of `input_index`.
    ///
    /// Firing rules compare `count >= 0`, which always holds; the others use
    /// `count < 0`, which never does. Both run the same query.
    pub fn index_threshold(name: &str, interval: &str, firing: bool, input_index: &str) -> Self {
        let comparator = if firing { ">=" } else { "<" };

        Self {
            enabled: true,
            name: name.to_string(),
            alert_type_id: INDEX_THRESHOLD_RULE_TYPE.to_string(),
            consumer: "alerts".to_string(),
            schedule: RuleSchedule {
                interval: interval.to_string(),
            },
            throttle: Some(interval.to_string()),
            actions: Vec::new(),
            params: json!({
                "index": [input_index],
                "timeField": "@timestamp",
                "aggType": "count",
                "groupBy": "all",
                "timeWindowSize": 1,
                "timeWindowUnit": "m",
                "thresholdComparator": comparator,
                "threshold": [0],
            }),
        }
    }

    pub fn is_firing(&self) -> bool {
        self.params["thresholdComparator"] == ">="
    }
}

/// The subset of `/api/status` the sampler records
#[derive(Debug, Clone, Deserialize)]
pub struct KibanaStatus {
    #[serde(default)]
    pub name: String,
    pub uuid: String,
    #[serde(default)]
    pub metrics: Option<StatusMetrics>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusMetrics {
    #[serde(default)]
    pub process: Option<ProcessMetrics>,
    #[serde(default)]
    pub response_times: Option<ResponseTimes>,
    #[serde(default)]
    pub requests: Option<RequestCounts>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessMetrics {
    #[serde(default)]
    pub memory: Option<ProcessMemory>,
    #[serde(default)]
    pub event_loop_delay: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessMemory {
    pub heap: HeapMemory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeapMemory {
    pub used_in_bytes: f64,
    #[serde(default)]
    pub total_in_bytes: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseTimes {
    #[serde(default)]
    pub avg_in_millis: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub total: Option<u64>,
}

const MB: f64 = 1024.0 * 1024.0;

impl KibanaStatus {
    pub fn into_sample(self, deployment: &str, date: DateTime<Utc>) -> KibanaStatusSample {
        let metrics = self.metrics;
        let process = metrics.as_ref().and_then(|m| m.process.as_ref());
        let heap = process.and_then(|p| p.memory.as_ref()).map(|m| &m.heap);

        KibanaStatusSample {
            deployment: deployment.to_string(),
            date,
            instance: self.uuid,
            heap_used_mb: heap.map(|h| h.used_in_bytes / MB).unwrap_or_default(),
            heap_total_mb: heap.and_then(|h| h.total_in_bytes).map(|b| b / MB),
            event_loop_delay_ms: process.and_then(|p| p.event_loop_delay),
            response_time_avg_ms: metrics
                .as_ref()
                .and_then(|m| m.response_times.as_ref())
                .and_then(|r| r.avg_in_millis),
            requests_total: metrics
                .as_ref()
                .and_then(|m| m.requests.as_ref())
                .and_then(|r| r.total),
        }
    }
}

/// The subset of `/api/task_manager/_health` the sampler records
#[derive(Debug, Clone, Deserialize)]
pub struct TaskManagerHealth {
    /// Kibana server uuid of the answering instance
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub stats: TaskManagerStats,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskManagerStats {
    #[serde(default)]
    pub runtime: Option<StatValue<RuntimeStats>>,
    #[serde(default)]
    pub workload: Option<StatValue<WorkloadStats>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatValue<T> {
    pub value: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeStats {
    #[serde(default)]
    pub drift: Option<Percentiles>,
    #[serde(default)]
    pub load: Option<Percentiles>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Percentiles {
    #[serde(default)]
    pub p50: Option<f64>,
    #[serde(default)]
    pub p99: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadStats {
    #[serde(default)]
    pub overdue: Option<u64>,
}

impl TaskManagerHealth {
    pub fn into_sample(self, deployment: &str, date: DateTime<Utc>) -> TaskManagerSample {
        let runtime = self.stats.runtime.map(|r| r.value);
        let drift = runtime.as_ref().and_then(|r| r.drift.as_ref());
        let load = runtime.as_ref().and_then(|r| r.load.as_ref());

        TaskManagerSample {
            deployment: deployment.to_string(),
            date,
            instance: self.id,
            status: self.status,
            drift_p50_ms: drift.and_then(|d| d.p50),
            drift_p99_ms: drift.and_then(|d| d.p99),
            load_p50: load.and_then(|l| l.p50),
            load_p99: load.and_then(|l| l.p99),
            overdue: self.stats.workload.and_then(|w| w.value.overdue),
        }
    }
}
