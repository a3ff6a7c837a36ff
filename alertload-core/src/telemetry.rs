//! Telemetry samples and event log records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One Kibana process status reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KibanaStatusSample {
    pub deployment: String,
    pub date: DateTime<Utc>,
    /// Kibana server uuid
    pub instance: String,
    pub heap_used_mb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heap_total_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_loop_delay_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_avg_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_total: Option<u64>,
}

/// One task manager health reading from a single Kibana instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskManagerSample {
    pub deployment: String,
    pub date: DateTime<Utc>,
    /// Kibana server uuid the reading came from
    pub instance: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift_p50_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drift_p99_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_p50: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_p99: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overdue: Option<u64>,
}

/// Append-only telemetry collected over a run, one list per metric kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    pub kibana_status: Vec<KibanaStatusSample>,
    pub task_manager: Vec<TaskManagerSample>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all kinds
    pub fn len(&self) -> usize {
        self.kibana_status.len() + self.task_manager.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every record of `batch` to the end of this set, keeping order
    pub fn append(&mut self, batch: &mut SampleSet) {
        self.kibana_status.append(&mut batch.kibana_status);
        self.task_manager.append(&mut batch.task_manager);
    }
}

/// A normalized event log record (one rule or action execution)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub deployment: String,
    pub provider: String,
    pub date: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
}

/// Stable sort by timestamp; records with equal dates keep arrival order
pub fn sort_by_date(records: &mut [LogRecord]) {
    records.sort_by(|a, b| a.date.cmp(&b.date));
}
