//! Core error types for alertload

use thiserror::Error;

/// Error taxonomy shared by every alertload crate.
///
/// Only [`AlertLoadError::Configuration`] and [`AlertLoadError::Provisioning`]
/// end a run; everything else is logged and the run degrades.
#[derive(Debug, Error)]
pub enum AlertLoadError {
    /// Invalid scenario, suite or sizing parameters. Raised before any remote call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Creation or health-timeout failure of a deployment
    #[error("Provisioning error for {deployment}: {message}")]
    Provisioning { deployment: String, message: String },

    /// Network / 5xx / timeout on a retryable call, surfaced after retries ran out
    #[error("Remote call failed: {0}")]
    TransientRemote(String),

    /// One deployment's telemetry fetch failed inside a sample cycle
    #[error("Sampling {deployment} failed: {message}")]
    PartialSample { deployment: String, message: String },

    /// One work item's object creation failed
    #[error("Creating object {index} on {deployment} failed: {message}")]
    PartialCreation {
        deployment: String,
        index: usize,
        message: String,
    },

    /// A delete call failed; the deployment is left behind
    #[error("Deleting {deployment} failed: {message}")]
    Teardown { deployment: String, message: String },

    /// Handing the aggregated data to the report sink failed
    #[error("Report error: {0}")]
    Report(String),
}

/// Result type alias for alertload
pub type Result<T> = std::result::Result<T, AlertLoadError>;

impl AlertLoadError {
    /// Build a configuration error from anything printable
    pub fn config(message: impl Into<String>) -> Self {
        AlertLoadError::Configuration(message.into())
    }

    /// Build a provisioning error for a named deployment
    pub fn provisioning(deployment: impl Into<String>, message: impl ToString) -> Self {
        AlertLoadError::Provisioning {
            deployment: deployment.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error aborts the run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AlertLoadError::Configuration(_) | AlertLoadError::Provisioning { .. }
        )
    }

    /// Short machine-readable code, used in log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            AlertLoadError::Configuration(_) => "CONFIGURATION",
            AlertLoadError::Provisioning { .. } => "PROVISIONING",
            AlertLoadError::TransientRemote(_) => "TRANSIENT_REMOTE",
            AlertLoadError::PartialSample { .. } => "PARTIAL_SAMPLE",
            AlertLoadError::PartialCreation { .. } => "PARTIAL_CREATION",
            AlertLoadError::Teardown { .. } => "TEARDOWN",
            AlertLoadError::Report(_) => "REPORT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_and_provisioning_are_fatal() {
        assert!(AlertLoadError::config("bad percent").is_fatal());
        assert!(AlertLoadError::provisioning("d1", "timed out").is_fatal());

        let degraded = [
            AlertLoadError::TransientRemote("503".to_string()),
            AlertLoadError::PartialSample {
                deployment: "d1".to_string(),
                message: "refused".to_string(),
            },
            AlertLoadError::PartialCreation {
                deployment: "d1".to_string(),
                index: 4,
                message: "400".to_string(),
            },
            AlertLoadError::Teardown {
                deployment: "d1".to_string(),
                message: "exit 1".to_string(),
            },
            AlertLoadError::Report("disk full".to_string()),
        ];
        for err in degraded {
            assert!(!err.is_fatal(), "{} should not be fatal", err);
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AlertLoadError::config("x").error_code(), "CONFIGURATION");
        assert_eq!(
            AlertLoadError::provisioning("d", "x").error_code(),
            "PROVISIONING"
        );
    }

    #[test]
    fn test_display_includes_deployment() {
        let err = AlertLoadError::PartialCreation {
            deployment: "run-0".to_string(),
            index: 5,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Creating object 5 on run-0 failed: boom");
    }
}
