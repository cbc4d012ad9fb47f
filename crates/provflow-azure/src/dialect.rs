//! Argument construction per Azure CLI revision
//!
//! The same logical operation has been spelled differently across CLI
//! releases. Each `CliDialect` owns one spelling; `AzureCli` only asks the
//! dialect for a `CommandSpec` and runs it.

use crate::descriptor::{
    BlobCopy, BlobCopyQuery, ClusterOptions, Endpoint, JobQuery, StorageContainer, VmOptions,
};
use crate::error::{AzureError, Result};
use serde::{Deserialize, Serialize};

/// Argument list for one CLI invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub args: Vec<String>,

    /// Whether stdout is JSON
    pub json: bool,
}

impl CommandSpec {
    fn new(words: &[&str]) -> Self {
        Self {
            args: words.iter().map(|w| w.to_string()).collect(),
            json: false,
        }
    }

    fn arg(mut self, value: impl ToString) -> Self {
        self.args.push(value.to_string());
        self
    }

    fn opt(self, flag: &str, value: impl ToString) -> Self {
        self.arg(flag).arg(value)
    }

    fn opt_if(self, flag: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.opt(flag, v),
            None => self,
        }
    }

    /// Append `--json` and expect JSON output
    fn json(mut self) -> Self {
        self.json = true;
        self.arg("--json")
    }

    /// `--json` only when the dialect reports mutations as JSON
    fn json_if(self, enabled: bool) -> Self {
        if enabled { self.json() } else { self }
    }
}

/// Azure CLI revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CliDialect {
    /// Every command reports JSON; VM name passed with `--vm-name`
    #[default]
    Json,

    /// Early releases: mutating commands print plain text, the VM name is
    /// the positional DNS label and endpoint names use `--name=<value>`
    Legacy,
}

impl std::fmt::Display for CliDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliDialect::Json => write!(f, "json"),
            CliDialect::Legacy => write!(f, "legacy"),
        }
    }
}

impl std::str::FromStr for CliDialect {
    type Err = AzureError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(CliDialect::Json),
            "legacy" => Ok(CliDialect::Legacy),
            other => Err(AzureError::InvalidDescriptor(format!(
                "unknown CLI dialect '{other}' (expected 'json' or 'legacy')"
            ))),
        }
    }
}

impl CliDialect {
    fn mutations_report_json(&self) -> bool {
        matches!(self, CliDialect::Json)
    }

    /// Index of the VM password in `vm create` arguments
    pub const VM_CREATE_PASSWORD_POSITION: usize = 5;

    /// Index of the account key in `storage container list` arguments
    pub const STORAGE_LIST_KEY_POSITION: usize = 6;

    pub fn check_version(&self) -> CommandSpec {
        CommandSpec::new(&["--version"])
    }

    pub fn network_create(&self, name: &str, location: &str) -> CommandSpec {
        CommandSpec::new(&["network", "vnet", "create", name, "-l", location])
            .json_if(self.mutations_report_json())
    }

    pub fn network_delete(&self, name: &str) -> CommandSpec {
        CommandSpec::new(&["network", "vnet", "delete", name, "--quiet"])
            .json_if(self.mutations_report_json())
    }

    pub fn vm_create(&self, vm: &VmOptions) -> Result<CommandSpec> {
        let spec = match self {
            CliDialect::Json => CommandSpec::new(&[
                "vm",
                "create",
                vm.dns_name(),
                vm.image_name.as_str(),
                vm.user.as_str(),
                vm.pass.as_str(),
                "--ssh",
            ])
            .json()
            .opt("--vm-name", &vm.name),
            CliDialect::Legacy => {
                if vm.dns_name() != vm.name {
                    return Err(AzureError::InvalidDescriptor(format!(
                        "the legacy CLI names the VM after its DNS label; 'dnsName' ({}) must match 'name' ({})",
                        vm.dns_name(),
                        vm.name
                    )));
                }
                CommandSpec::new(&[
                    "vm",
                    "create",
                    vm.name.as_str(),
                    vm.image_name.as_str(),
                    vm.user.as_str(),
                    vm.pass.as_str(),
                ])
                .arg("--ssh")
            }
        };

        Ok(spec
            .opt_if("--virtual-network-name", vm.network_name.as_deref())
            .opt_if("--location", vm.location.as_deref())
            .opt_if("--static-ip", vm.static_ip.as_deref())
            .opt_if("--ssh-cert", vm.ssh_cert_file.as_ref().map(|p| p.display()))
            .opt_if("--vm-size", vm.vm_size.as_deref()))
    }

    pub fn endpoint_create(&self, vm_name: &str, endpoint: &Endpoint) -> CommandSpec {
        let spec = CommandSpec::new(&["vm", "endpoint", "create", vm_name])
            .arg(endpoint.external_port)
            .arg(endpoint.internal_port);

        match self {
            CliDialect::Json => spec.opt("--name", &endpoint.name).json(),
            CliDialect::Legacy => spec.arg(format!("--name={}", endpoint.name)),
        }
    }

    pub fn vm_show(&self, name: &str) -> CommandSpec {
        CommandSpec::new(&["vm", "show", name]).json()
    }

    pub fn vm_delete(&self, name: &str) -> CommandSpec {
        CommandSpec::new(&["vm", "delete", name, "--blob-delete", "--quiet"])
            .json_if(self.mutations_report_json())
    }

    pub fn cluster_create(&self, cluster: &ClusterOptions) -> CommandSpec {
        CommandSpec::new(&["hdinsight", "cluster", "create", "--osType", "linux"])
            .opt("--storageContainer", &cluster.storage_container)
            .opt("--password", &cluster.password)
            .opt("--sshPassword", &cluster.ssh_password)
            .opt("--sshUserName", &cluster.ssh_user_name)
            .opt("--clusterName", &cluster.cluster_name)
            .opt("--storageAccountName", cluster.storage_account_host())
            .opt("--storageAccountKey", &cluster.storage_account_key)
            .opt("--dataNodeCount", cluster.data_node_count())
            .opt("--userName", &cluster.user_name)
            .opt("--location", &cluster.location)
            .json_if(self.mutations_report_json())
            .opt_if("--subscription", cluster.subscription.as_deref())
    }

    pub fn cluster_show(&self, name: &str) -> CommandSpec {
        CommandSpec::new(&["hdinsight", "cluster", "show", name, "--osType", "linux"]).json()
    }

    pub fn cluster_delete(&self, name: &str, location: &str) -> CommandSpec {
        CommandSpec::new(&["hdinsight", "cluster", "delete"])
            .opt("--clusterName", name)
            .opt("--osType", "linux")
            .opt("--location", location)
            .json_if(self.mutations_report_json())
    }

    pub fn storage_container_list(&self, account: &str, key: &str) -> CommandSpec {
        CommandSpec::new(&["storage", "container", "list", "-a", account, "-k", key]).json()
    }

    pub fn storage_container_create(&self, storage: &StorageContainer) -> CommandSpec {
        CommandSpec::new(&["storage", "container", "create", storage.container_name.as_str()])
            .opt("--account-name", &storage.storage_account_name)
            .opt("--account-key", &storage.storage_account_key)
            .json_if(self.mutations_report_json())
    }

    pub fn storage_container_delete(&self, storage: &StorageContainer) -> CommandSpec {
        CommandSpec::new(&["storage", "container", "delete", storage.container_name.as_str()])
            .opt("--account-name", &storage.storage_account_name)
            .opt("--account-key", &storage.storage_account_key)
            .json_if(self.mutations_report_json())
    }

    pub fn job_list(&self, query: &JobQuery) -> CommandSpec {
        CommandSpec::new(&["hdinsight", "job", "list"])
            .opt("--clusterDnsName", &query.cluster_dns_name)
            .opt("--userName", &query.user_name)
            .opt("--password", &query.password)
            .json()
    }

    pub fn job_show(&self, query: &JobQuery, job_id: &str) -> CommandSpec {
        CommandSpec::new(&["hdinsight", "job", "show"])
            .opt("--clusterDnsName", &query.cluster_dns_name)
            .opt("--userName", &query.user_name)
            .opt("--password", &query.password)
            .opt("--jobId", job_id)
            .json()
    }

    pub fn blob_copy_start(&self, copy: &BlobCopy) -> CommandSpec {
        CommandSpec::new(&["storage", "blob", "copy", "start"])
            .opt("--account-key", &copy.origin_account_key)
            .opt("--account-name", &copy.origin_storage_account_name)
            .opt("--source-uri", &copy.origin_uri)
            .opt("--dest-account-key", &copy.destination_account_key)
            .opt("--dest-account-name", &copy.destination_storage_account_name)
            .opt("--dest-container", &copy.destination_container)
            .json()
    }

    pub fn blob_copy_show(&self, query: &BlobCopyQuery) -> CommandSpec {
        CommandSpec::new(&["storage", "blob", "copy", "show"])
            .opt("--account-key", &query.origin_account_key)
            .opt("--account-name", &query.origin_storage_account_name)
            .opt("--blob", &query.blob)
            .opt("--container", &query.container)
            .json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn words(spec: &CommandSpec) -> Vec<&str> {
        spec.args.iter().map(String::as_str).collect()
    }

    fn vm() -> VmOptions {
        VmOptions::new("vm1", "East US", "img", "u", "p")
    }

    #[test]
    fn test_json_vm_create() {
        let mut opts = vm();
        opts.dns_name = Some("svc1".to_string());
        opts.static_ip = Some("10.0.0.4".to_string());
        opts.ssh_cert_file = Some(PathBuf::from("/keys/cert.pem"));
        opts.vm_size = Some("Small".to_string());

        let spec = CliDialect::Json.vm_create(&opts).unwrap();

        assert!(spec.json);
        assert_eq!(
            words(&spec),
            vec![
                "vm", "create", "svc1", "img", "u", "p", "--ssh", "--json", "--vm-name", "vm1",
                "--location", "East US", "--static-ip", "10.0.0.4", "--ssh-cert",
                "/keys/cert.pem", "--vm-size", "Small",
            ]
        );
        assert_eq!(spec.args[CliDialect::VM_CREATE_PASSWORD_POSITION], "p");
    }

    #[test]
    fn test_legacy_vm_create() {
        let mut opts = vm();
        opts.location = None;
        opts.network_name = Some("net1".to_string());

        let spec = CliDialect::Legacy.vm_create(&opts).unwrap();

        assert!(!spec.json);
        assert_eq!(
            words(&spec),
            vec![
                "vm", "create", "vm1", "img", "u", "p", "--ssh", "--virtual-network-name", "net1"
            ]
        );
    }

    #[test]
    fn test_legacy_rejects_distinct_dns_name() {
        let mut opts = vm();
        opts.dns_name = Some("other".to_string());
        let err = CliDialect::Legacy.vm_create(&opts).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_endpoint_create() {
        let endpoint = Endpoint::new("http", 80, 8080);

        let json = CliDialect::Json.endpoint_create("vm1", &endpoint);
        assert_eq!(
            words(&json),
            vec!["vm", "endpoint", "create", "vm1", "80", "8080", "--name", "http", "--json"]
        );

        let legacy = CliDialect::Legacy.endpoint_create("vm1", &endpoint);
        assert_eq!(
            words(&legacy),
            vec!["vm", "endpoint", "create", "vm1", "80", "8080", "--name=http"]
        );
    }

    #[test]
    fn test_status_commands_always_json() {
        for dialect in [CliDialect::Json, CliDialect::Legacy] {
            let spec = dialect.vm_show("myvm");
            assert!(spec.json);
            assert_eq!(words(&spec), vec!["vm", "show", "myvm", "--json"]);

            let spec = dialect.cluster_show("cl1");
            assert_eq!(
                words(&spec),
                vec!["hdinsight", "cluster", "show", "cl1", "--osType", "linux", "--json"]
            );
        }
    }

    #[test]
    fn test_cluster_create() {
        let cluster = ClusterOptions {
            cluster_name: "cl1".into(),
            location: "East US".into(),
            storage_account_name: "acct".into(),
            storage_account_key: "key".into(),
            storage_container: "data".into(),
            user_name: "admin".into(),
            password: "pw".into(),
            ssh_user_name: "ssh".into(),
            ssh_password: "sshpw".into(),
            subscription: Some("sub-1".into()),
            data_node_count: None,
        };

        let spec = CliDialect::Json.cluster_create(&cluster);

        assert_eq!(
            words(&spec),
            vec![
                "hdinsight", "cluster", "create", "--osType", "linux",
                "--storageContainer", "data",
                "--password", "pw",
                "--sshPassword", "sshpw",
                "--sshUserName", "ssh",
                "--clusterName", "cl1",
                "--storageAccountName", "acct.blob.core.windows.net",
                "--storageAccountKey", "key",
                "--dataNodeCount", "4",
                "--userName", "admin",
                "--location", "East US",
                "--json",
                "--subscription", "sub-1",
            ]
        );
    }

    #[test]
    fn test_network_create() {
        assert_eq!(
            words(&CliDialect::Json.network_create("net1", "East US")),
            vec!["network", "vnet", "create", "net1", "-l", "East US", "--json"]
        );
        assert_eq!(
            words(&CliDialect::Legacy.network_create("net1", "East US")),
            vec!["network", "vnet", "create", "net1", "-l", "East US"]
        );
    }

    #[test]
    fn test_storage_list() {
        let spec = CliDialect::Json.storage_container_list("acct", "key");
        assert_eq!(spec.args[CliDialect::STORAGE_LIST_KEY_POSITION], "key");
        assert_eq!(
            words(&CliDialect::Json.storage_container_list("acct", "key")),
            vec!["storage", "container", "list", "-a", "acct", "-k", "key", "--json"]
        );
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("JSON".parse::<CliDialect>().unwrap(), CliDialect::Json);
        assert_eq!("legacy".parse::<CliDialect>().unwrap(), CliDialect::Legacy);
        assert!("v3".parse::<CliDialect>().is_err());
    }
}
