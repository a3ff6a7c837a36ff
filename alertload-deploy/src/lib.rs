//! Deployment provisioning for alertload
//!
//! [`ProvisioningBackend`] is the seam to the cloud provider; [`EcctlBackend`]
//! drives the `ecctl` CLI. [`DeploymentProvisioner`] owns the lifecycle of a
//! single deployment: sizing checks, creation, health polling and teardown.

pub mod backend;
pub mod ecctl;
pub mod error;
pub mod provisioner;

pub use backend::{
    CreateRequest, CreatedDeployment, DeploymentStatus, ListedDeployment, ProvisioningBackend,
    ResourceInfo,
};
pub use ecctl::EcctlBackend;
pub use error::BackendError;
pub use provisioner::{
    CreatedDeployments, DeploymentProvisioner, ProvisionState, ProvisionerSettings,
};
