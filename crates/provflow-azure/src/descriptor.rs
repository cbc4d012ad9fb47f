//! Resource descriptors
//!
//! Caller-supplied configuration for the resources provflow creates. Field
//! names follow the camelCase keys used in descriptor files, e.g.
//!
//! ```yaml
//! name: web1
//! location: East US
//! imageName: b39f27a8b8c64d52b05eac6a62ebad85__Ubuntu-14_04-LTS-amd64-server
//! user: azureuser
//! pass: Secret123!
//! endpoints:
//!   - { name: http, externalPort: 80, internalPort: 8080 }
//! provisionScript: [install.sh, configure.sh]
//! provisioningTemplateView:
//!   appPort: 8080
//! ```

use crate::error::{AzureError, Result};
use provflow_cloud::OneOrMany;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Key/value object scripts are rendered against
pub type TemplateView = Map<String, Value>;

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AzureError::InvalidDescriptor(format!(
            "'{field}' must not be empty"
        )));
    }
    Ok(())
}

fn require_opt(field: &str, value: &Option<String>) -> Result<()> {
    match value {
        Some(v) => require(field, v),
        None => Ok(()),
    }
}

/// Network endpoint opened on a VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub name: String,
    pub external_port: u16,
    pub internal_port: u16,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, external_port: u16, internal_port: u16) -> Self {
        Self {
            name: name.into(),
            external_port,
            internal_port,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require("endpoint name", &self.name)?;
        if self.external_port == 0 || self.internal_port == 0 {
            return Err(AzureError::InvalidDescriptor(format!(
                "endpoint '{}' ports must be positive (got {} -> {})",
                self.name, self.external_port, self.internal_port
            )));
        }
        Ok(())
    }
}

/// Options for creating a VM
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmOptions {
    pub name: String,

    /// Cloud service DNS name; defaults to `name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,

    /// Existing virtual network to join (exclusive with `location`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,

    /// Region to create the VM in (exclusive with `network_name`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    pub image_name: String,
    pub user: String,
    pub pass: String,

    #[serde(rename = "staticIP", skip_serializing_if = "Option::is_none")]
    pub static_ip: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,

    /// Public certificate installed on the VM for SSH
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_cert_file: Option<PathBuf>,

    /// Private key used to push provisioning scripts instead of the password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key_file: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm_size: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provision_script: Option<OneOrMany<PathBuf>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_template_view: Option<TemplateView>,
}

impl VmOptions {
    /// Minimal descriptor placed in `location`
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        image_name: impl Into<String>,
        user: impl Into<String>,
        pass: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: Some(location.into()),
            image_name: image_name.into(),
            user: user.into(),
            pass: pass.into(),
            ..Default::default()
        }
    }

    /// Check the descriptor before any external call is made
    pub fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        require("imageName", &self.image_name)?;
        require("user", &self.user)?;
        require("pass", &self.pass)?;
        require_opt("dnsName", &self.dns_name)?;
        require_opt("networkName", &self.network_name)?;
        require_opt("location", &self.location)?;
        require_opt("staticIP", &self.static_ip)?;
        require_opt("vmSize", &self.vm_size)?;

        match (&self.network_name, &self.location) {
            (Some(_), Some(_)) => {
                return Err(AzureError::InvalidDescriptor(
                    "can't specify both 'networkName' and 'location'".to_string(),
                ));
            }
            (None, None) => {
                return Err(AzureError::InvalidDescriptor(
                    "must specify one of 'networkName' or 'location'".to_string(),
                ));
            }
            _ => {}
        }

        for endpoint in &self.endpoints {
            endpoint.validate()?;
        }

        if let Some(scripts) = &self.provision_script {
            if scripts.is_empty() {
                return Err(AzureError::InvalidDescriptor(
                    "'provisionScript' list is empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// DNS label of the cloud service hosting the VM
    pub fn dns_name(&self) -> &str {
        self.dns_name.as_deref().unwrap_or(&self.name)
    }

    /// Resolve relative script paths against `base`
    pub fn resolve_scripts(&mut self, base: &Path) {
        if let Some(scripts) = self.provision_script.take() {
            let resolve = |p: PathBuf| if p.is_relative() { base.join(p) } else { p };
            self.provision_script = Some(match scripts {
                OneOrMany::One(p) => OneOrMany::One(resolve(p)),
                OneOrMany::Many(ps) => OneOrMany::Many(ps.into_iter().map(resolve).collect()),
            });
        }
    }
}

/// Options for creating an HDInsight cluster backed by an existing storage account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOptions {
    pub cluster_name: String,
    pub location: String,
    pub storage_account_name: String,
    pub storage_account_key: String,
    pub storage_container: String,
    pub user_name: String,
    pub password: String,
    pub ssh_user_name: String,
    pub ssh_password: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_node_count: Option<u32>,
}

impl ClusterOptions {
    pub const DEFAULT_DATA_NODE_COUNT: u32 = 4;

    pub fn validate(&self) -> Result<()> {
        require("clusterName", &self.cluster_name)?;
        require("location", &self.location)?;
        require("storageAccountName", &self.storage_account_name)?;
        require("storageAccountKey", &self.storage_account_key)?;
        require("storageContainer", &self.storage_container)?;
        require("userName", &self.user_name)?;
        require("password", &self.password)?;
        require("sshUserName", &self.ssh_user_name)?;
        require("sshPassword", &self.ssh_password)?;
        require_opt("subscription", &self.subscription)?;
        if self.data_node_count == Some(0) {
            return Err(AzureError::InvalidDescriptor(
                "'dataNodeCount' must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn data_node_count(&self) -> u32 {
        self.data_node_count
            .unwrap_or(Self::DEFAULT_DATA_NODE_COUNT)
    }

    /// Blob endpoint host of the backing storage account
    pub fn storage_account_host(&self) -> String {
        format!("{}.blob.core.windows.net", self.storage_account_name)
    }

    /// The container the cluster stores its data in
    pub fn storage(&self) -> StorageContainer {
        StorageContainer {
            container_name: self.storage_container.clone(),
            storage_account_name: self.storage_account_name.clone(),
            storage_account_key: self.storage_account_key.clone(),
        }
    }
}

/// A blob container in a storage account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageContainer {
    pub container_name: String,
    pub storage_account_name: String,
    pub storage_account_key: String,
}

impl StorageContainer {
    pub fn validate(&self) -> Result<()> {
        require("containerName", &self.container_name)?;
        require("storageAccountName", &self.storage_account_name)?;
        require("storageAccountKey", &self.storage_account_key)
    }
}

/// Credentials for the HDInsight job API of a cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    pub cluster_dns_name: String,
    pub user_name: String,
    pub password: String,
}

impl JobQuery {
    pub fn validate(&self) -> Result<()> {
        require("clusterDnsName", &self.cluster_dns_name)?;
        require("userName", &self.user_name)?;
        require("password", &self.password)
    }
}

/// Start copying a blob into a container of another storage account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobCopy {
    pub origin_account_key: String,
    pub origin_storage_account_name: String,

    #[serde(rename = "originURI")]
    pub origin_uri: String,

    pub destination_account_key: String,
    pub destination_storage_account_name: String,
    pub destination_container: String,
}

impl BlobCopy {
    pub fn validate(&self) -> Result<()> {
        require("originAccountKey", &self.origin_account_key)?;
        require("originStorageAccountName", &self.origin_storage_account_name)?;
        require("originURI", &self.origin_uri)?;
        require("destinationAccountKey", &self.destination_account_key)?;
        require(
            "destinationStorageAccountName",
            &self.destination_storage_account_name,
        )?;
        require("destinationContainer", &self.destination_container)
    }
}

/// Query the progress of a blob copy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobCopyQuery {
    pub origin_account_key: String,
    pub origin_storage_account_name: String,
    pub blob: String,
    pub container: String,
}

impl BlobCopyQuery {
    pub fn validate(&self) -> Result<()> {
        require("originAccountKey", &self.origin_account_key)?;
        require("originStorageAccountName", &self.origin_storage_account_name)?;
        require("blob", &self.blob)?;
        require("container", &self.container)
    }
}
