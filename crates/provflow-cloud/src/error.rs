//! Cloud provisioning error types

use std::time::Duration;
use thiserror::Error;

/// Provisioning errors
///
/// `Configuration` is raised before any external call is made and is never
/// retried. The remaining runtime variants propagate up through the pipeline
/// and abort the steps that follow.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Command `{program}` failed{}: {message}", .exit_code.map(|c| format!(" (exit code {c})")).unwrap_or_default())]
    ExternalCommand {
        program: String,
        args: Vec<String>,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        message: String,
    },

    #[error("Resource {resource} reported error state `{state}`")]
    ResourceProvisioning {
        resource: String,
        state: String,
        record: serde_json::Value,
    },

    #[error("Remote execution on {host} failed{}: {message}", .exit_code.map(|c| format!(" (exit code {c})")).unwrap_or_default())]
    RemoteExecution {
        host: String,
        exit_code: Option<i32>,
        stderr: String,
        message: String,
    },

    #[error(
        "Timed out waiting for {resource} after {attempts} attempts ({elapsed:?}), last state: {}",
        .last_state.as_deref().unwrap_or("unknown")
    )]
    PollingTimeout {
        resource: String,
        attempts: u32,
        elapsed: Duration,
        last_state: Option<String>,
        last_error: Option<String>,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Whether the poller may re-issue the operation that produced this error
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CloudError::ExternalCommand { .. } | CloudError::Json(_) | CloudError::Io(_)
        )
    }

    /// Captured stderr of a failed command or remote execution, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            CloudError::ExternalCommand { stderr, .. } => Some(stderr),
            CloudError::RemoteExecution { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
