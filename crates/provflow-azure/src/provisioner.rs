//! VM and cluster provisioning workflows
//!
//! ```text
//! provision_vm:      validate → vm create → endpoints → wait ReadyRole → scripts over SSH
//! provision_cluster: validate → storage container → cluster create → wait target state
//! ```
//!
//! Every step runs after the previous one succeeded. The first failure is
//! returned and nothing after it is started.

use crate::azure_cli::AzureCli;
use crate::descriptor::{ClusterOptions, TemplateView, VmOptions};
use crate::error::Result;
use crate::ssh::{RemoteExecutor, SshAuth, SshTarget};
use crate::status::{ClusterStatus, VmStatus};
use crate::template::ScriptTemplate;
use provflow_cloud::{CloudError, ExecutionPolicy, OneOrMany, Pipeline, StatePoller};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default suffix appended to a cloud service DNS label
pub const DEFAULT_HOST_SUFFIX: &str = ".cloudapp.net";

/// Outcome of `provision_vm`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmProvisionReport {
    pub name: String,
    pub host: String,
    pub status: VmStatus,
    /// Remote stdout of each provisioning script, in order
    pub script_outputs: Vec<String>,
}

/// Orchestrates Azure CLI calls, status polling and remote scripts
pub struct AzureProvisioner {
    cli: AzureCli,
    remote: Arc<dyn RemoteExecutor>,
    poller: StatePoller,
    endpoint_pipeline: Pipeline,
    host_suffix: String,
}

impl AzureProvisioner {
    pub fn new(cli: AzureCli, remote: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            cli,
            remote,
            poller: StatePoller::default(),
            endpoint_pipeline: Pipeline::sequential(),
            host_suffix: DEFAULT_HOST_SUFFIX.to_string(),
        }
    }

    pub fn with_poller(mut self, poller: StatePoller) -> Self {
        self.poller = poller;
        self
    }

    /// Scheduling of endpoint creation (sequential unless configured)
    pub fn with_endpoint_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.endpoint_pipeline = Pipeline::new(policy);
        self
    }

    pub fn with_host_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.host_suffix = suffix.into();
        self
    }

    pub fn cli(&self) -> &AzureCli {
        &self.cli
    }

    /// Host name a VM is reachable at
    pub fn host_for(&self, vm: &VmOptions) -> String {
        format!("{}{}", vm.dns_name(), self.host_suffix)
    }

    /// SSH login for a VM: its key file if given, otherwise its password
    pub fn ssh_target_for(&self, vm: &VmOptions) -> SshTarget {
        let auth = match &vm.ssh_key_file {
            Some(key) => SshAuth::Certificate(key.clone()),
            None => SshAuth::Password(vm.pass.clone()),
        };
        SshTarget::new(self.host_for(vm), vm.user.clone(), auth)
    }

    /// Create a VM and open its endpoints
    pub async fn create_vm(&self, vm: &VmOptions) -> Result<Value> {
        vm.validate()?;
        let created = self.cli.create_vm(vm).await?;
        self.create_endpoints(vm).await?;
        Ok(created)
    }

    /// Open the descriptor's endpoints on an existing VM
    pub async fn create_endpoints(&self, vm: &VmOptions) -> Result<Vec<Value>> {
        if vm.endpoints.is_empty() {
            return Ok(Vec::new());
        }

        let cli = &self.cli;
        let name = vm.name.as_str();
        self.endpoint_pipeline
            .run(OneOrMany::Many(vm.endpoints.iter().collect()), |endpoint| async move {
                cli.create_endpoint(name, endpoint).await
            })
            .await
    }

    /// Wait until the VM reports `ReadyRole`
    pub async fn wait_vm_running(&self, name: &str) -> Result<VmStatus> {
        let cli = &self.cli;
        let status = self
            .poller
            .poll_until(
                &format!("VM {name}"),
                || async move { cli.get_vm_status(name).await.map_err(CloudError::from) },
                VmStatus::observe,
            )
            .await?;
        Ok(status)
    }

    /// Wait until the cluster reports `target_state`
    pub async fn wait_cluster_state(&self, name: &str, target_state: &str) -> Result<ClusterStatus> {
        let cli = &self.cli;
        let status = self
            .poller
            .poll_until(
                &format!("cluster {name}"),
                || async move { cli.get_cluster_status(name).await.map_err(CloudError::from) },
                |status: &ClusterStatus| status.observe(target_state),
            )
            .await?;
        Ok(status)
    }

    /// Render `template` with `view` and run it on `target`
    pub async fn run_ssh_script(
        &self,
        target: &SshTarget,
        template: &str,
        view: Option<&TemplateView>,
    ) -> Result<String> {
        let script = ScriptTemplate::new().render_str(template, view)?;
        Ok(self.remote.exec(target, &script).await?)
    }

    /// Read, render and run a script file on `target`
    pub async fn run_ssh_script_file(
        &self,
        target: &SshTarget,
        path: &Path,
        view: Option<&TemplateView>,
    ) -> Result<String> {
        let script = ScriptTemplate::new().render_file(path, view).await?;
        tracing::info!(host = %target.host, script = %path.display(), "Running provisioning script");
        Ok(self.remote.exec(target, &script).await?)
    }

    /// Run scripts one after another; a failing script stops the rest
    pub async fn run_provisioning_scripts(
        &self,
        target: &SshTarget,
        scripts: OneOrMany<PathBuf>,
        view: Option<&TemplateView>,
    ) -> Result<Vec<String>> {
        Pipeline::sequential()
            .run(scripts, |path| async move {
                self.run_ssh_script_file(target, &path, view).await
            })
            .await
    }

    /// Create a VM, wait for it to run and apply its provisioning scripts
    pub async fn provision_vm(&self, vm: &VmOptions) -> Result<VmProvisionReport> {
        vm.validate()?;

        self.create_vm(vm).await?;
        let status = self.wait_vm_running(&vm.name).await?;

        let target = self.ssh_target_for(vm);
        let script_outputs = match &vm.provision_script {
            Some(scripts) => {
                tracing::info!(vm = %vm.name, host = %target.host, count = scripts.len(), "Provisioning VM");
                self.run_provisioning_scripts(
                    &target,
                    scripts.clone(),
                    vm.provisioning_template_view.as_ref(),
                )
                .await?
            }
            None => Vec::new(),
        };

        Ok(VmProvisionReport {
            name: vm.name.clone(),
            host: target.host,
            status,
            script_outputs,
        })
    }

    /// Create the storage container and cluster, then wait for `target_state`
    pub async fn provision_cluster(
        &self,
        cluster: &ClusterOptions,
        target_state: &str,
    ) -> Result<ClusterStatus> {
        cluster.validate()?;

        self.cli
            .create_storage_container(&cluster.storage())
            .await?;
        self.cli.create_cluster(cluster).await?;
        self.wait_cluster_state(&cluster.cluster_name, target_state)
            .await
    }
}
