//! External command runner
//!
//! Spawns a CLI binary with an argument list and captures its output.
//! The runner is a trait so provider wrappers can be exercised against a
//! scripted stub instead of a real subprocess.

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Flags whose following argument is never written to logs
const SECRET_FLAGS: &[&str] = &[
    "--password",
    "--sshPassword",
    "--storageAccountKey",
    "--account-key",
    "--dest-account-key",
];

/// Captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runner settings
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Log invoked commands and their output at info level instead of debug
    pub verbose: bool,

    /// Positional secrets to mask in log lines
    pub redact_rules: Vec<RedactRule>,
}

/// Masks the argument at `position` whenever the argument list starts with `prefix`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactRule {
    pub prefix: Vec<String>,
    pub position: usize,
}

impl RedactRule {
    pub fn new(prefix: &[&str], position: usize) -> Self {
        Self {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            position,
        }
    }

    fn applies_to(&self, args: &[String]) -> bool {
        args.len() > self.position && args.starts_with(&self.prefix)
    }
}

impl RunnerConfig {
    pub fn verbose(verbose: bool) -> Self {
        Self {
            verbose,
            ..Default::default()
        }
    }
}

/// Command runner abstraction
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, returning the captured output on success.
    ///
    /// A non-zero exit or a spawn failure is an `ExternalCommand` error
    /// carrying whatever output was captured.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs commands as local subprocesses
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    config: RunnerConfig,
}

impl ProcessRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    fn log_invocation(&self, program: &str, args: &[String]) {
        let line = format_command_line(program, args, &self.config.redact_rules);
        if self.config.verbose {
            tracing::info!("Invoking command: {}", line);
        } else {
            tracing::debug!("Running: {}", line);
        }
    }

    fn log_output(&self, output: &CommandOutput) {
        if self.config.verbose {
            if !output.stdout.is_empty() {
                tracing::info!(stdout = %output.stdout.trim_end(), "command stdout");
            }
            if !output.stderr.is_empty() {
                tracing::info!(stderr = %output.stderr.trim_end(), "command stderr");
            }
        } else {
            tracing::trace!(
                exit_code = output.exit_code,
                stdout_len = output.stdout.len(),
                stderr_len = output.stderr.len(),
                "command finished"
            );
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        if args.is_empty() {
            return Err(CloudError::Configuration(format!(
                "refusing to run `{program}` without arguments"
            )));
        }

        self.log_invocation(program, args);

        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = cmd.output().await.map_err(|e| CloudError::ExternalCommand {
            program: program.to_string(),
            args: args.to_vec(),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            message: format!("failed to spawn: {e}"),
        })?;

        let captured = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };
        self.log_output(&captured);

        check_status(program, args, captured)
    }
}

/// Turn a captured non-zero exit into an `ExternalCommand` error
pub fn check_status(
    program: &str,
    args: &[String],
    output: CommandOutput,
) -> Result<CommandOutput> {
    if output.is_success() {
        return Ok(output);
    }

    let message = if output.stderr.trim().is_empty() {
        output.stdout.trim().to_string()
    } else {
        output.stderr.trim().to_string()
    };

    Err(CloudError::ExternalCommand {
        program: program.to_string(),
        args: args.to_vec(),
        exit_code: Some(output.exit_code),
        stdout: output.stdout,
        stderr: output.stderr,
        message,
    })
}

/// Shell-quoted command line with secret values masked
pub fn format_command_line(program: &str, args: &[String], rules: &[RedactRule]) -> String {
    let mut masked = redact_args(args);
    for rule in rules.iter().filter(|r| r.applies_to(args)) {
        masked[rule.position] = "***".to_string();
    }
    let mut words = Vec::with_capacity(masked.len() + 1);
    words.push(program.to_string());
    words.extend(masked);
    shell_words::join(words)
}

/// Replace values following secret flags with `***`
pub fn redact_args(args: &[String]) -> Vec<String> {
    let mut masked = Vec::with_capacity(args.len());
    let mut hide_next = false;

    for arg in args {
        if hide_next {
            masked.push("***".to_string());
            hide_next = false;
            continue;
        }

        if let Some((flag, _)) = arg.split_once('=') {
            if SECRET_FLAGS.contains(&flag) {
                masked.push(format!("{flag}=***"));
                continue;
            }
        }

        hide_next = SECRET_FLAGS.contains(&arg.as_str());
        masked.push(arg.clone());
    }

    masked
}
