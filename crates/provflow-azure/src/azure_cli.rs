//! Azure CLI wrapper
//!
//! Wraps the classic cross-platform `azure` CLI commands used to provision
//! networks, VMs, HDInsight clusters and storage.

use crate::descriptor::{
    BlobCopy, BlobCopyQuery, ClusterOptions, Endpoint, JobQuery, StorageContainer, VmOptions,
};
use crate::dialect::{CliDialect, CommandSpec};
use crate::error::{AzureError, Result};
use crate::status::{ClusterStatus, VmStatus};
use provflow_cloud::{CloudError, CommandRunner, RedactRule};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Default CLI binary name
pub const DEFAULT_PROGRAM: &str = "azure";

/// Azure CLI wrapper
#[derive(Clone)]
pub struct AzureCli {
    runner: Arc<dyn CommandRunner>,
    program: String,
    dialect: CliDialect,
}

impl std::fmt::Debug for AzureCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCli")
            .field("program", &self.program)
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl AzureCli {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: DEFAULT_PROGRAM.to_string(),
            dialect: CliDialect::default(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_dialect(mut self, dialect: CliDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn dialect(&self) -> CliDialect {
        self.dialect
    }

    /// Log redaction for positional secrets of this CLI
    pub fn redact_rules() -> Vec<RedactRule> {
        vec![
            RedactRule::new(&["vm", "create"], CliDialect::VM_CREATE_PASSWORD_POSITION),
            RedactRule::new(
                &["storage", "container", "list"],
                CliDialect::STORAGE_LIST_KEY_POSITION,
            ),
        ]
    }

    /// Run a command and return stdout as JSON, or as a JSON string for
    /// commands that print plain text
    async fn execute(&self, spec: CommandSpec) -> Result<Value> {
        let output = self.runner.run(&self.program, &spec.args).await?;

        if spec.json {
            parse_json(&output.stdout)
        } else {
            Ok(Value::String(output.stdout.trim().to_string()))
        }
    }

    /// Run a JSON command and deserialize its output; empty stdout is `null`
    pub async fn run_json<T: DeserializeOwned>(&self, spec: CommandSpec) -> Result<T> {
        let value = self.execute(spec).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Check that the CLI can be invoked, returning its version
    pub async fn check_installed(&self) -> Result<String> {
        match self.runner.run(&self.program, &self.dialect.check_version().args).await {
            Ok(output) => Ok(output.stdout.trim().to_string()),
            Err(CloudError::ExternalCommand {
                exit_code: None, ..
            }) => Err(AzureError::CliNotFound(self.program.clone())),
            Err(e) => Err(e.into()),
        }
    }

    // ========== Networks ==========

    /// Create a virtual network
    pub async fn create_network(&self, name: &str, location: &str) -> Result<Value> {
        if name.trim().is_empty() || location.trim().is_empty() {
            return Err(AzureError::InvalidDescriptor(
                "network name and location are required".to_string(),
            ));
        }
        tracing::info!(network = name, location, "Creating network");
        self.execute(self.dialect.network_create(name, location)).await
    }

    /// Delete a virtual network
    pub async fn delete_network(&self, name: &str) -> Result<Value> {
        tracing::info!(network = name, "Deleting network");
        self.execute(self.dialect.network_delete(name)).await
    }

    // ========== VMs ==========

    /// Create a VM. Endpoints are not opened here; see `create_endpoint`.
    pub async fn create_vm(&self, vm: &VmOptions) -> Result<Value> {
        vm.validate()?;
        let spec = self.dialect.vm_create(vm)?;

        match (&vm.network_name, &vm.location) {
            (Some(network), _) => {
                tracing::info!(vm = %vm.name, network = %network, "Creating VM")
            }
            (_, Some(location)) => {
                tracing::info!(vm = %vm.name, location = %location, "Creating VM")
            }
            _ => {}
        }

        self.execute(spec).await
    }

    /// Open an endpoint on an existing VM
    pub async fn create_endpoint(&self, vm_name: &str, endpoint: &Endpoint) -> Result<Value> {
        endpoint.validate()?;
        tracing::info!(
            vm = vm_name,
            endpoint = %endpoint.name,
            external_port = endpoint.external_port,
            internal_port = endpoint.internal_port,
            "Creating endpoint"
        );
        self.execute(self.dialect.endpoint_create(vm_name, endpoint))
            .await
    }

    /// Get the status record of a VM
    pub async fn get_vm_status(&self, name: &str) -> Result<VmStatus> {
        self.run_json(self.dialect.vm_show(name)).await
    }

    /// Delete a VM together with its disks
    pub async fn delete_vm(&self, name: &str) -> Result<Value> {
        tracing::info!(vm = name, "Deleting VM");
        self.execute(self.dialect.vm_delete(name)).await
    }

    // ========== HDInsight clusters ==========

    /// Create a cluster on an existing storage container
    pub async fn create_cluster(&self, cluster: &ClusterOptions) -> Result<Value> {
        cluster.validate()?;
        tracing::info!(cluster = %cluster.cluster_name, location = %cluster.location, "Creating cluster");
        self.execute(self.dialect.cluster_create(cluster)).await
    }

    /// Get the status record of a cluster
    pub async fn get_cluster_status(&self, name: &str) -> Result<ClusterStatus> {
        self.run_json(self.dialect.cluster_show(name)).await
    }

    /// Delete a cluster
    pub async fn delete_cluster(&self, name: &str, location: &str) -> Result<Value> {
        tracing::info!(cluster = name, location, "Deleting cluster");
        self.execute(self.dialect.cluster_delete(name, location))
            .await
    }

    // ========== Storage ==========

    /// List blob containers of a storage account
    pub async fn list_storage_containers(&self, account: &str, key: &str) -> Result<Value> {
        tracing::debug!(account, "Getting storage containers");
        self.execute(self.dialect.storage_container_list(account, key))
            .await
    }

    /// Create a blob container
    pub async fn create_storage_container(&self, storage: &StorageContainer) -> Result<Value> {
        storage.validate()?;
        tracing::info!(container = %storage.container_name, "Creating storage container");
        self.execute(self.dialect.storage_container_create(storage))
            .await
    }

    /// Delete a blob container
    pub async fn delete_storage_container(&self, storage: &StorageContainer) -> Result<Value> {
        storage.validate()?;
        tracing::info!(container = %storage.container_name, "Deleting storage container");
        self.execute(self.dialect.storage_container_delete(storage))
            .await
    }

    /// Start copying a blob to a container in another account
    pub async fn copy_dataset(&self, copy: &BlobCopy) -> Result<Value> {
        copy.validate()?;
        tracing::info!(source = %copy.origin_uri, container = %copy.destination_container, "Starting blob copy");
        self.execute(self.dialect.blob_copy_start(copy)).await
    }

    /// Progress of a blob copy
    pub async fn copy_dataset_status(&self, query: &BlobCopyQuery) -> Result<Value> {
        query.validate()?;
        self.execute(self.dialect.blob_copy_show(query)).await
    }

    // ========== Jobs ==========

    /// List jobs submitted to a cluster
    pub async fn list_jobs(&self, query: &JobQuery) -> Result<Value> {
        query.validate()?;
        self.execute(self.dialect.job_list(query)).await
    }

    /// Status of a single job
    pub async fn job_status(&self, query: &JobQuery, job_id: &str) -> Result<Value> {
        query.validate()?;
        if job_id.trim().is_empty() {
            return Err(AzureError::InvalidDescriptor("job id is required".to_string()));
        }
        self.execute(self.dialect.job_show(query, job_id)).await
    }
}

/// Parse CLI stdout as JSON; empty output is `null`
pub fn parse_json(stdout: &str) -> Result<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(trimmed)
        .map_err(|e| AzureError::UnexpectedOutput(format!("{e}: {}", truncate(trimmed, 200))))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
