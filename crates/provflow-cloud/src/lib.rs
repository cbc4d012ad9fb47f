//! provflow cloud core
//!
//! Provider-independent plumbing shared by the provisioning crates:
//! running an external CLI, waiting for a resource to settle, and chaining
//! provisioning steps in order.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  provflow CLI                    │
//! │          (prov vm provision, cluster ...)        │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 provflow-azure                   │
//! │   AzureCli · AzureProvisioner · SshExecutor      │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 provflow-cloud                   │
//! │  ┌──────────────┐ ┌─────────────┐ ┌───────────┐ │
//! │  │CommandRunner │ │ StatePoller │ │ Pipeline  │ │
//! │  └──────────────┘ └─────────────┘ └───────────┘ │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod pipeline;
pub mod poller;
pub mod runner;

// Re-exports
pub use error::{CloudError, Result};
pub use pipeline::{ExecutionPolicy, OneOrMany, Pipeline};
pub use poller::{Observation, PollPolicy, PollState, StatePoller};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner, RedactRule, RunnerConfig};
pub use tokio_util::sync::CancellationToken;
