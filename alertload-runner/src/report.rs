//! Run report hand-off

use alertload_core::{AlertLoadError, DeploymentSummary, LogRecord, Result, SampleSet, Suite};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Rule creation outcome on one deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleLoad {
    pub deployment: String,
    pub requested: usize,
    pub created: usize,
    pub failed: usize,
    pub firing: usize,
}

/// Everything collected during a run. Contains no credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_name: String,
    pub suite: Suite,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub deployments: Vec<DeploymentSummary>,
    pub rules: Vec<RuleLoad>,
    /// Sorted by date
    pub event_log: Vec<LogRecord>,
    pub samples: SampleSet,
}

/// Receives the finished report
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Store `report`; returns where it went
    async fn deliver(&self, report: &RunReport) -> Result<String>;
}

/// Writes `<output_dir>/<run_name>.json`
#[derive(Debug, Clone)]
pub struct JsonReportWriter {
    output_dir: PathBuf,
    pretty: bool,
}

impl JsonReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            pretty: true,
        }
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn path_for(&self, run_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.json", run_name))
    }

    fn report_error(path: &Path, error: impl std::fmt::Display) -> AlertLoadError {
        AlertLoadError::Report(format!("{}: {}", path.display(), error))
    }
}

#[async_trait]
impl ReportSink for JsonReportWriter {
    async fn deliver(&self, report: &RunReport) -> Result<String> {
        let path = self.path_for(&report.run_name);

        let content = if self.pretty {
            serde_json::to_vec_pretty(report)
        } else {
            serde_json::to_vec(report)
        }
        .map_err(|e| Self::report_error(&path, e))?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| Self::report_error(&self.output_dir, e))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| Self::report_error(&path, e))?;

        info!(
            path = %path.display(),
            records = report.event_log.len(),
            samples = report.samples.len(),
            "report written"
        );
        Ok(path.display().to_string())
    }
}
