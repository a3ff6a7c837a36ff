//! Run orchestration for alertload
//!
//! [`RunOrchestrator`] sequences one benchmark session: provisioning, rule
//! load, background telemetry sampling, event log collection, the report
//! hand-off and teardown. The built-in suites live in [`SuiteCatalog`].

pub mod catalog;
pub mod connector;
pub mod orchestrator;
pub mod report;
pub mod sampler;

pub use catalog::SuiteCatalog;
pub use connector::{Connection, DeploymentConnector, HttpConnector};
pub use orchestrator::{run_name, RunOrchestrator, RunSettings, RunSummary};
pub use report::{JsonReportWriter, ReportSink, RuleLoad, RunReport};
pub use sampler::{SampleTarget, StatsSampler, WorkerRoster, WorkerSampler};
