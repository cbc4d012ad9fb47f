//! Status records returned by `vm show` and `hdinsight cluster show`

use provflow_cloud::{Observation, PollState};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `InstanceStatus` of a VM that is up and accepting connections
pub const VM_READY_STATE: &str = "ReadyRole";

/// VM instance states that will never reach `ReadyRole` on their own
pub const VM_ERROR_STATES: &[&str] = &[
    "ProvisioningFailed",
    "FailedStartingRole",
    "FailedStartingVM",
    "Error",
];

/// Cluster state reported when provisioning failed
pub const CLUSTER_ERROR_STATE: &str = "Error";

/// Output of `azure vm show <name> --json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmStatus {
    #[serde(rename = "InstanceStatus", skip_serializing_if = "Option::is_none")]
    pub instance_status: Option<String>,

    /// Everything else the CLI reported
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VmStatus {
    pub fn observe(&self) -> Observation {
        Observation::classify(
            self.instance_status.as_deref(),
            VM_READY_STATE,
            VM_ERROR_STATES,
        )
    }

    pub fn is_running(&self) -> bool {
        self.observe().state == PollState::Target
    }

    /// Public IP of the first network endpoint, when reported
    pub fn ip_address(&self) -> Option<&str> {
        self.extra
            .get("Network")
            .and_then(|n| n.get("Endpoints"))
            .and_then(|e| e.get(0))
            .and_then(|e| e.get("virtualIPAddress"))
            .and_then(Value::as_str)
            .or_else(|| self.extra.get("IPAddress").and_then(Value::as_str))
    }
}

/// Output of `azure hdinsight cluster show <name> --json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClusterStatus {
    pub fn observe(&self, target: &str) -> Observation {
        Observation::classify(self.state.as_deref(), target, &[CLUSTER_ERROR_STATE])
    }
}
