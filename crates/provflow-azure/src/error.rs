//! Azure provider error types

use provflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("Azure CLI `{0}` not found. Please install: npm install -g azure-cli")]
    CliNotFound(String),

    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Unexpected CLI output: {0}")]
    UnexpectedOutput(String),

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AzureError {
    /// Invalid or contradictory caller input; never retried
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AzureError::InvalidDescriptor(_)
                | AzureError::Cloud(CloudError::Configuration(_))
                | AzureError::Cloud(CloudError::Template(_))
        )
    }

    /// Errors the state poller may absorb and retry
    pub fn is_retryable(&self) -> bool {
        match self {
            AzureError::Cloud(e) => e.is_transient(),
            AzureError::JsonError(_) | AzureError::UnexpectedOutput(_) => true,
            _ => false,
        }
    }
}

/// Poll-loop fetches report `CloudError` so the poller can classify them
impl From<AzureError> for CloudError {
    fn from(err: AzureError) -> Self {
        match err {
            AzureError::Cloud(e) => e,
            AzureError::JsonError(e) => CloudError::Json(e),
            AzureError::IoError(e) => CloudError::Io(e),
            AzureError::InvalidDescriptor(msg) => CloudError::Configuration(msg),
            AzureError::CliNotFound(program) => {
                CloudError::Configuration(format!("Azure CLI `{program}` not found"))
            }
            AzureError::UnexpectedOutput(msg) => CloudError::ExternalCommand {
                program: "azure".to_string(),
                args: Vec::new(),
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
                message: msg,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, AzureError>;
