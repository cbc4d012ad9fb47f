//! Azure provider for provflow
//!
//! Drives the classic `azure` CLI to create networks, VMs, endpoints,
//! HDInsight clusters and storage containers, waits for them to settle and
//! pushes templated provisioning scripts to new VMs over SSH.
//!
//! # Requirements
//!
//! - `azure` CLI installed and logged in (`azure login`)
//! - `ssh`, plus `sshpass` when VMs are reached with a password
//!
//! # Example
//!
//! ```ignore
//! use provflow_azure::{AzureCli, AzureProvisioner, SshExecutor, VmOptions};
//! use provflow_cloud::{ProcessRunner, RunnerConfig};
//! use std::sync::Arc;
//!
//! let runner = Arc::new(ProcessRunner::new(RunnerConfig::default()));
//! let provisioner = AzureProvisioner::new(AzureCli::new(runner), Arc::new(SshExecutor::default()));
//!
//! let vm: VmOptions = serde_yaml::from_str(&std::fs::read_to_string("web1.yaml")?)?;
//! let report = provisioner.provision_vm(&vm).await?;
//! println!("{} is up at {}", report.name, report.host);
//! ```

pub mod azure_cli;
pub mod descriptor;
pub mod dialect;
pub mod error;
pub mod provisioner;
pub mod ssh;
pub mod status;
pub mod template;

#[cfg(test)]
mod testing;

pub use azure_cli::AzureCli;
pub use descriptor::{
    BlobCopy, BlobCopyQuery, ClusterOptions, Endpoint, JobQuery, StorageContainer, TemplateView,
    VmOptions,
};
pub use dialect::{CliDialect, CommandSpec};
pub use error::{AzureError, Result};
pub use provisioner::{AzureProvisioner, VmProvisionReport};
pub use ssh::{RemoteExecutor, SshAuth, SshExecutor, SshOptions, SshTarget};
pub use status::{ClusterStatus, VmStatus};
pub use template::ScriptTemplate;
