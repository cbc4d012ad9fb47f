//! プロビジョニング進捗の出力
//!
//! 各ステップの開始・完了・所要時間をタイムスタンプ付きで表示する。

use chrono::Local;
use colored::Colorize;
use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

/// プロビジョニングの各ステップ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    /// 記述ファイルの検証
    ValidateDescriptor,
    /// VM作成
    CreateVm,
    /// エンドポイント作成
    CreateEndpoints,
    /// VM起動待ち
    WaitVmRunning,
    /// プロビジョニングスクリプト実行
    RunScripts,
    /// ストレージコンテナ作成
    CreateStorageContainer,
    /// クラスタ作成
    CreateCluster,
    /// クラスタ状態待ち
    WaitClusterState,
}

impl ProvisionStep {
    /// ステップの日本語名
    pub fn name(&self) -> &'static str {
        match self {
            Self::ValidateDescriptor => "記述ファイル検証",
            Self::CreateVm => "VM作成",
            Self::CreateEndpoints => "エンドポイント作成",
            Self::WaitVmRunning => "VM起動待ち",
            Self::RunScripts => "プロビジョニングスクリプト実行",
            Self::CreateStorageContainer => "ストレージコンテナ作成",
            Self::CreateCluster => "クラスタ作成",
            Self::WaitClusterState => "クラスタ状態待ち",
        }
    }
}

/// ステップの実行結果
#[derive(Debug, Clone)]
pub enum StepResult {
    Success {
        duration: Duration,
    },
    Failed {
        error: String,
        duration: Duration,
    },
}

impl StepResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Success { duration, .. } | Self::Failed { duration, .. } => *duration,
        }
    }
}

/// プロビジョニングログ出力器
pub struct ProvisionLogger {
    start_time: Instant,
    step_results: Vec<(ProvisionStep, StepResult)>,
    current_step: Option<(ProvisionStep, Instant)>,
}

impl ProvisionLogger {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            step_results: Vec::new(),
            current_step: None,
        }
    }

    /// ステップ開始をログ出力
    pub fn start_step(&mut self, step: ProvisionStep) {
        println!("[{}] {} {}", timestamp().dimmed(), "▶".cyan(), step.name());
        self.current_step = Some((step, Instant::now()));
    }

    /// ステップ成功をログ出力
    pub fn step_success(&mut self, message: Option<&str>) {
        if let Some((step, start)) = self.current_step.take() {
            let duration = start.elapsed();
            let duration_str = format_duration(duration);

            match message {
                Some(msg) => println!(
                    "[{}] {} {} ({})",
                    timestamp().dimmed(),
                    "✓".green().bold(),
                    msg,
                    duration_str.dimmed()
                ),
                None => println!(
                    "[{}] {} {} 完了 ({})",
                    timestamp().dimmed(),
                    "✓".green().bold(),
                    step.name(),
                    duration_str.dimmed()
                ),
            }

            self.step_results.push((
                step,
                StepResult::Success { duration },
            ));
        }
    }

    /// ステップ失敗をログ出力
    pub fn step_failed(&mut self, error: &str) {
        if let Some((step, start)) = self.current_step.take() {
            let duration = start.elapsed();
            println!(
                "[{}] {} {}: {}",
                timestamp().dimmed(),
                "✗".red().bold(),
                step.name(),
                error.red()
            );

            self.step_results.push((
                step,
                StepResult::Failed {
                    error: error.to_string(),
                    duration,
                },
            ));
        }
    }

    /// ステップを実行し、結果をログ出力
    pub async fn run<T, E: Display>(
        &mut self,
        step: ProvisionStep,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, E> {
        self.start_step(step);
        match fut.await {
            Ok(value) => {
                self.step_success(None);
                Ok(value)
            }
            Err(e) => {
                self.step_failed(&e.to_string());
                Err(e)
            }
        }
    }

    /// 詳細メッセージをログ出力
    pub fn log_detail(&self, message: &str) {
        println!("[{}]   → {}", timestamp().dimmed(), message.cyan());
    }

    /// サマリーを出力
    pub fn print_summary(&self, resource: &str) {
        let total_duration = self.start_time.elapsed();
        let slowest_step = self
            .step_results
            .iter()
            .map(|(step, result)| (step, result.duration()))
            .max_by_key(|(_, d)| *d);

        println!();
        println!("{}", "═".repeat(44));
        println!("Provision Summary: {}", resource.cyan().bold());
        println!("{}", "─".repeat(44));
        println!("Total time:    {}", format_duration(total_duration).green());

        if let Some((step, duration)) = slowest_step {
            println!(
                "Slowest step:  {} ({})",
                step.name(),
                format_duration(duration)
            );
        }

        if self.all_success() {
            println!("Errors:        {}", "0".green());
        } else {
            let error_count = self
                .step_results
                .iter()
                .filter(|(_, result)| !result.is_success())
                .count();
            println!("Errors:        {}", error_count.to_string().red().bold());
            for (step, result) in &self.step_results {
                if let StepResult::Failed { error, .. } = result {
                    println!("  {} {}: {}", "✗".red(), step.name(), error);
                }
            }
        }
        println!("{}", "═".repeat(44));
    }

    /// 全ステップが成功したか
    pub fn all_success(&self) -> bool {
        self.step_results
            .iter()
            .all(|(_, result)| result.is_success())
    }
}

impl Default for ProvisionLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Duration を読みやすい形式にフォーマット
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        format!("{}m {}s", total_secs / 60, total_secs % 60)
    } else if total_secs >= 1 {
        format!("{}.{}s", total_secs, millis / 100)
    } else {
        format!("{}ms", millis)
    }
}
