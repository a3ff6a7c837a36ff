//! Core domain models and types for alertload
//!
//! This crate defines the domain language shared by the other crates:
//! deployment sizing, scenarios and suites, provisioned deployments,
//! telemetry samples, event log records and the error taxonomy.

pub mod deployment;
pub mod error;
pub mod scenario;
pub mod telemetry;
pub mod types;

// Re-export commonly used types at the crate root
pub use deployment::{Deployment, DeploymentSummary, ScenarioRef, INSTANCE_PREFIX};
pub use error::{AlertLoadError, Result};
pub use scenario::{is_firing, DeploymentSpec, Scenario, Suite, SuiteOverrides};
pub use telemetry::{KibanaStatusSample, LogRecord, SampleSet, TaskManagerSample};
pub use types::{ResourceSize, Subsystem};
