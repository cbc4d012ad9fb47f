//! Remote script execution over SSH
//!
//! Scripts are piped to `bash -s` on the remote host through the system
//! `ssh` client. Password logins go through `sshpass -e`, with the password
//! passed in the `SSHPASS` environment variable so it never shows up in the
//! process list.

use async_trait::async_trait;
use provflow_cloud::runner::format_command_line;
use provflow_cloud::{CloudError, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// How to authenticate against the remote host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SshAuth {
    Password(String),
    /// Private key file
    Certificate(PathBuf),
}

/// Remote host and login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: String,
    pub auth: SshAuth,
}

impl SshTarget {
    pub fn new(host: impl Into<String>, user: impl Into<String>, auth: SshAuth) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            auth,
        }
    }

    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

/// SSH client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshOptions {
    pub port: u16,
    pub connect_timeout: Duration,
    pub strict_host_key_checking: bool,
    pub ssh_program: String,
    pub sshpass_program: String,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            port: 22,
            connect_timeout: Duration::from_secs(30),
            // freshly created VMs have unknown host keys
            strict_host_key_checking: false,
            ssh_program: "ssh".to_string(),
            sshpass_program: "sshpass".to_string(),
        }
    }
}

/// Executes a script on a remote host and returns its stdout
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn exec(&self, target: &SshTarget, script: &str) -> Result<String>;
}

/// Fully resolved local invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Build the local command that runs `bash -s` on `target`
pub fn build_ssh_command(target: &SshTarget, options: &SshOptions) -> SshCommand {
    let mut ssh_args = vec![
        "-p".to_string(),
        options.port.to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", options.connect_timeout.as_secs().max(1)),
    ];

    if options.strict_host_key_checking {
        ssh_args.extend(["-o".to_string(), "StrictHostKeyChecking=yes".to_string()]);
    } else {
        ssh_args.extend([
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
        ]);
    }

    match &target.auth {
        SshAuth::Password(_) => {
            ssh_args.extend([
                "-o".to_string(),
                "PubkeyAuthentication=no".to_string(),
            ]);
        }
        SshAuth::Certificate(key) => {
            ssh_args.extend([
                "-i".to_string(),
                key.display().to_string(),
                "-o".to_string(),
                "BatchMode=yes".to_string(),
            ]);
        }
    }

    ssh_args.push(target.destination());
    ssh_args.extend(["bash".to_string(), "-s".to_string()]);

    match &target.auth {
        SshAuth::Password(password) => {
            let mut args = vec!["-e".to_string(), options.ssh_program.clone()];
            args.extend(ssh_args);
            SshCommand {
                program: options.sshpass_program.clone(),
                args,
                env: vec![("SSHPASS".to_string(), password.clone())],
            }
        }
        SshAuth::Certificate(_) => SshCommand {
            program: options.ssh_program.clone(),
            args: ssh_args,
            env: Vec::new(),
        },
    }
}

/// `RemoteExecutor` backed by the system ssh client
#[derive(Debug, Clone, Default)]
pub struct SshExecutor {
    options: SshOptions,
}

impl SshExecutor {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SshOptions {
        &self.options
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn exec(&self, target: &SshTarget, script: &str) -> Result<String> {
        let command = build_ssh_command(target, &self.options);
        tracing::debug!(
            host = %target.host,
            "Running: {}",
            format_command_line(&command.program, &command.args, &[])
        );

        let spawn_error = |e: std::io::Error| CloudError::RemoteExecution {
            host: target.host.clone(),
            exit_code: None,
            stderr: String::new(),
            message: format!("failed to spawn `{}`: {e}", command.program),
        };

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        // stdin is fed while stdout/stderr are drained, so a remote side
        // that echoes input can't fill both pipes
        let stdin = child.stdin.take();
        let send = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(script.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        };
        let (sent, output) = tokio::join!(send, child.wait_with_output());

        let output = output?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        // a failed login closes stdin early; its exit status is the real error
        if !output.status.success() {
            return Err(CloudError::RemoteExecution {
                host: target.host.clone(),
                exit_code: output.status.code(),
                message: if stderr.trim().is_empty() {
                    "remote script failed".to_string()
                } else {
                    stderr.trim().to_string()
                },
                stderr,
            });
        }

        if let Err(e) = sent {
            return Err(CloudError::RemoteExecution {
                host: target.host.clone(),
                exit_code: output.status.code(),
                message: format!("script was not fully sent: {e}"),
                stderr,
            });
        }

        tracing::debug!(host = %target.host, stdout_len = stdout.len(), "remote script finished");
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn password_target() -> SshTarget {
        SshTarget::new("vm1.cloudapp.net", "azureuser", SshAuth::Password("s3cret".into()))
    }

    #[test]
    fn test_password_command_uses_sshpass_env() {
        let cmd = build_ssh_command(&password_target(), &SshOptions::default());

        assert_eq!(cmd.program, "sshpass");
        assert_eq!(
            cmd.args,
            vec![
                "-e", "ssh", "-p", "22",
                "-o", "ConnectTimeout=30",
                "-o", "StrictHostKeyChecking=no",
                "-o", "UserKnownHostsFile=/dev/null",
                "-o", "PubkeyAuthentication=no",
                "azureuser@vm1.cloudapp.net", "bash", "-s",
            ]
        );
        assert_eq!(cmd.env, vec![("SSHPASS".to_string(), "s3cret".to_string())]);
        assert!(!cmd.args.iter().any(|a| a.contains("s3cret")));
    }

    #[test]
    fn test_certificate_command() {
        let target = SshTarget::new(
            "10.0.0.4",
            "deploy",
            SshAuth::Certificate(PathBuf::from("/keys/id_rsa")),
        );
        let options = SshOptions {
            port: 2222,
            connect_timeout: Duration::from_secs(5),
            strict_host_key_checking: true,
            ..Default::default()
        };

        let cmd = build_ssh_command(&target, &options);

        assert_eq!(cmd.program, "ssh");
        assert_eq!(
            cmd.args,
            vec![
                "-p", "2222",
                "-o", "ConnectTimeout=5",
                "-o", "StrictHostKeyChecking=yes",
                "-i", "/keys/id_rsa",
                "-o", "BatchMode=yes",
                "deploy@10.0.0.4", "bash", "-s",
            ]
        );
        assert!(cmd.env.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_pipes_script_to_stdin() {
        // `sh -c 'cat'`-like stand-in: ssh args are ignored, stdin is echoed
        let dir = tempfile::tempdir().unwrap();
        let fake_ssh = dir.path().join("fake-ssh");
        std::fs::write(&fake_ssh, "#!/bin/sh\ncat\n").unwrap();
        make_executable(&fake_ssh);

        let executor = SshExecutor::new(SshOptions {
            ssh_program: fake_ssh.display().to_string(),
            ..Default::default()
        });
        let target = SshTarget::new("h", "u", SshAuth::Certificate(PathBuf::from("k")));

        let out = executor.exec(&target, "echo hello\n").await.unwrap();
        assert_eq!(out, "echo hello\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_failure_is_remote_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let fake_ssh = dir.path().join("fake-ssh");
        std::fs::write(&fake_ssh, "#!/bin/sh\ncat >/dev/null\necho 'bash: line 1: boom' >&2\nexit 7\n")
            .unwrap();
        make_executable(&fake_ssh);

        let executor = SshExecutor::new(SshOptions {
            ssh_program: fake_ssh.display().to_string(),
            ..Default::default()
        });
        let target = SshTarget::new("vm1", "u", SshAuth::Certificate(PathBuf::from("k")));

        let err = executor.exec(&target, "boom").await.unwrap_err();
        match err {
            CloudError::RemoteExecution {
                host,
                exit_code,
                stderr,
                ..
            } => {
                assert_eq!(host, "vm1");
                assert_eq!(exit_code, Some(7));
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rejected_login_with_large_script() {
        let dir = tempfile::tempdir().unwrap();
        let fake_ssh = dir.path().join("fake-ssh");
        std::fs::write(
            &fake_ssh,
            "#!/bin/sh\necho 'Permission denied (password).' >&2\nexit 255\n",
        )
        .unwrap();
        make_executable(&fake_ssh);

        let executor = SshExecutor::new(SshOptions {
            ssh_program: fake_ssh.display().to_string(),
            ..Default::default()
        });
        let target = SshTarget::new("vm1", "u", SshAuth::Certificate(PathBuf::from("k")));
        let script = "echo provisioning step\n".repeat(64 * 1024);

        let err = executor.exec(&target, &script).await.unwrap_err();
        match err {
            CloudError::RemoteExecution {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, Some(255));
                assert!(stderr.contains("Permission denied"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_remote_echo_of_large_script_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let fake_ssh = dir.path().join("fake-ssh");
        std::fs::write(&fake_ssh, "#!/bin/sh\nwhile IFS= read -r line; do echo \"$line\"; done\n")
            .unwrap();
        make_executable(&fake_ssh);

        let executor = SshExecutor::new(SshOptions {
            ssh_program: fake_ssh.display().to_string(),
            ..Default::default()
        });
        let target = SshTarget::new("vm1", "u", SshAuth::Certificate(PathBuf::from("k")));
        let script: String = (0..20_000).map(|i| format!("echo line {i}\n")).collect();

        let out = tokio::time::timeout(Duration::from_secs(60), executor.exec(&target, &script))
            .await
            .expect("exec did not finish")
            .unwrap();
        assert_eq!(out, script);
    }

    #[tokio::test]
    async fn test_missing_ssh_binary() {
        let executor = SshExecutor::new(SshOptions {
            ssh_program: "/nonexistent/ssh".to_string(),
            ..Default::default()
        });
        let target = SshTarget::new("vm1", "u", SshAuth::Certificate(PathBuf::from("k")));

        let err = executor.exec(&target, "true").await.unwrap_err();
        assert!(matches!(
            err,
            CloudError::RemoteExecution { exit_code: None, .. }
        ));
    }

    #[cfg(unix)]
    fn make_executable(path: &std::path::Path) {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }
}
