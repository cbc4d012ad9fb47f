//! 設定からランナー・プロビジョナーを組み立てる

use anyhow::Context as _;
use provflow_azure::{AzureCli, AzureProvisioner, CliDialect, SshExecutor, SshOptions};
use provflow_cloud::{
    CancellationToken, CommandRunner, ExecutionPolicy, PollPolicy, ProcessRunner, RunnerConfig,
    StatePoller,
};
use provflow_config::{EndpointPolicy, ProvflowConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// コマンド実行に必要な共有状態
pub struct AppContext {
    pub config: ProvflowConfig,
    pub cancel: CancellationToken,
}

impl AppContext {
    /// `--verbose` / `--timeout` を設定に反映して作成
    pub fn new(mut config: ProvflowConfig, verbose: bool, timeout_secs: Option<u64>) -> Self {
        config.verbose |= verbose;
        if let Some(secs) = timeout_secs {
            config.poll.timeout_secs = Some(secs);
        }
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Ctrl-C で cancel トークンを発火させる
    pub fn cancel_on_ctrl_c(&self) {
        let token = self.cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                token.cancel();
            }
        });
    }

    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::new(ProcessRunner::new(RunnerConfig {
            verbose: self.config.verbose,
            redact_rules: AzureCli::redact_rules(),
        }))
    }

    pub fn dialect(&self) -> anyhow::Result<CliDialect> {
        self.config
            .cli
            .dialect
            .parse::<CliDialect>()
            .context("cli.dialect の値が不正です")
    }

    pub fn cli(&self) -> anyhow::Result<AzureCli> {
        Ok(AzureCli::new(self.runner())
            .with_program(self.config.cli.program.clone())
            .with_dialect(self.dialect()?))
    }

    pub fn poll_policy(&self) -> PollPolicy {
        let poll = &self.config.poll;
        PollPolicy {
            initial_delay: poll.initial_delay(),
            max_delay: poll.max_delay(),
            backoff_multiplier: poll.backoff_multiplier,
            max_attempts: poll.max_attempts,
            timeout: poll.timeout(),
            max_consecutive_failures: poll.max_consecutive_failures,
        }
    }

    pub fn endpoint_policy(&self) -> ExecutionPolicy {
        match self.config.endpoints.policy {
            EndpointPolicy::Sequential => ExecutionPolicy::Sequential,
            EndpointPolicy::Parallel => {
                ExecutionPolicy::BoundedParallel(self.config.endpoints.max_parallel)
            }
        }
    }

    pub fn ssh_options(&self) -> SshOptions {
        let ssh = &self.config.ssh;
        SshOptions {
            port: ssh.port,
            connect_timeout: Duration::from_secs(ssh.connect_timeout_secs),
            strict_host_key_checking: ssh.strict_host_key_checking,
            ..Default::default()
        }
    }

    pub fn provisioner(&self) -> anyhow::Result<AzureProvisioner> {
        let poller = StatePoller::new(self.poll_policy()).with_cancellation(self.cancel.clone());
        Ok(
            AzureProvisioner::new(self.cli()?, Arc::new(SshExecutor::new(self.ssh_options())))
                .with_poller(poller)
                .with_endpoint_policy(self.endpoint_policy())
                .with_host_suffix(self.config.ssh.host_suffix.clone()),
        )
    }

    /// Ctrl-C で中断可能な形で実行
    pub async fn cancellable<T, E>(&self, fut: impl Future<Output = Result<T, E>>) -> anyhow::Result<T>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => anyhow::bail!("中断されました"),
            result = fut => Ok(result?),
        }
    }
}
