//! Test doubles for the Azure CLI and SSH

use crate::ssh::{RemoteExecutor, SshTarget};
use async_trait::async_trait;
use provflow_cloud::runner::check_status;
use provflow_cloud::{CloudError, CommandOutput, CommandRunner, Result};
use std::sync::{Arc, Mutex};

type Handler = Box<dyn Fn(&[String]) -> CommandOutput + Send + Sync>;

/// `CommandRunner` answering from a closure and recording every call
pub struct ScriptedRunner {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    handler: Option<Handler>,
}

impl ScriptedRunner {
    pub fn new(handler: impl Fn(&[String]) -> CommandOutput + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            handler: Some(Box::new(handler)),
        })
    }

    /// Behaves as if the program is not installed
    pub fn failing_spawn() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            handler: None,
        })
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, args)| args.clone())
            .collect()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(program, _)| program.clone())
            .collect()
    }

    /// First two words of each call, e.g. `vm show`
    pub fn verbs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|args| args.iter().take(2).cloned().collect::<Vec<_>>().join(" "))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));

        match &self.handler {
            Some(handler) => check_status(program, args, handler(args)),
            None => Err(CloudError::ExternalCommand {
                program: program.to_string(),
                args: args.to_vec(),
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                message: "failed to spawn: No such file or directory".to_string(),
            }),
        }
    }
}

/// `RemoteExecutor` that records scripts and fails on a marker
#[derive(Default)]
pub struct RecordingExecutor {
    executed: Mutex<Vec<(SshTarget, String)>>,
    fail_marker: Option<String>,
}

impl RecordingExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail any script containing `marker`
    pub fn failing_on(marker: &str) -> Arc<Self> {
        Arc::new(Self {
            executed: Mutex::new(Vec::new()),
            fail_marker: Some(marker.to_string()),
        })
    }

    pub fn scripts(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(_, script)| script.clone())
            .collect()
    }

    pub fn targets(&self) -> Vec<SshTarget> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(target, _)| target.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteExecutor for RecordingExecutor {
    async fn exec(&self, target: &SshTarget, script: &str) -> Result<String> {
        self.executed
            .lock()
            .unwrap()
            .push((target.clone(), script.to_string()));

        if let Some(marker) = &self.fail_marker {
            if script.contains(marker.as_str()) {
                return Err(CloudError::RemoteExecution {
                    host: target.host.clone(),
                    exit_code: Some(1),
                    stderr: format!("{marker}: command failed"),
                    message: "remote script failed".to_string(),
                });
            }
        }

        Ok(format!("ran {} bytes", script.len()))
    }
}
