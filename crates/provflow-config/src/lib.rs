pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 設定ファイルパスを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "PROVFLOW_CONFIG_PATH";

const CANDIDATES: &[&str] = &["provflow.yaml", ".provflow.yaml"];

/// provflow の設定 (provflow.yaml)
///
/// ```yaml
/// verbose: false
/// cli:
///   program: azure
///   dialect: json
/// poll:
///   initial_delay_ms: 2000
///   timeout_secs: 1800
/// endpoints:
///   policy: parallel
///   max_parallel: 4
/// ssh:
///   port: 22
///   host_suffix: .cloudapp.net
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvflowConfig {
    /// 実行コマンドと出力を info レベルでログ出力する
    pub verbose: bool,
    pub cli: CliConfig,
    pub poll: PollConfig,
    pub endpoints: EndpointConfig,
    pub ssh: SshConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Azure CLI の実行ファイル
    pub program: String,
    /// 引数の書式 (`json` / `legacy`)
    pub dialect: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            program: "azure".to_string(),
            dialect: "json".to_string(),
        }
    }
}

/// 状態待ちのポーリング設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_attempts: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub max_consecutive_failures: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2_000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            max_attempts: None,
            timeout_secs: Some(30 * 60),
            max_consecutive_failures: Some(5),
        }
    }
}

impl PollConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// エンドポイント作成の実行方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointPolicy {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub policy: EndpointPolicy,
    /// `parallel` 時の同時実行数
    pub max_parallel: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            policy: EndpointPolicy::Sequential,
            max_parallel: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub port: u16,
    pub connect_timeout_secs: u64,
    pub strict_host_key_checking: bool,
    /// VM の DNS 名に付与するサフィックス
    pub host_suffix: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            port: 22,
            connect_timeout_secs: 30,
            strict_host_key_checking: false,
            host_suffix: ".cloudapp.net".to_string(),
        }
    }
}

impl ProvflowConfig {
    /// YAML 文字列から読み込む（空ならデフォルト）
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// ファイルから読み込む
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::ConfigFileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content, path)
    }

    /// 明示指定されたファイル、または探索で見つかったファイルから読み込む
    ///
    /// 設定ファイルが見つからない場合はデフォルト設定を返す。
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file()?,
        };

        match path {
            Some(path) => Ok((Self::load_from(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let poll = &self.poll;
        if !poll.backoff_multiplier.is_finite() || poll.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "poll.backoff_multiplier は 1.0 以上を指定してください: {}",
                poll.backoff_multiplier
            )));
        }
        if poll.initial_delay_ms > poll.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "poll.initial_delay_ms ({}) が poll.max_delay_ms ({}) を超えています",
                poll.initial_delay_ms, poll.max_delay_ms
            )));
        }
        if poll.initial_delay_ms == 0 && poll.max_delay_ms > 0 {
            return Err(ConfigError::Invalid(
                "poll.initial_delay_ms が 0 の場合は poll.max_delay_ms も 0 にしてください".to_string(),
            ));
        }
        if poll.max_attempts == Some(0) {
            return Err(ConfigError::Invalid(
                "poll.max_attempts は 1 以上を指定してください".to_string(),
            ));
        }
        if self.endpoints.max_parallel == 0 {
            return Err(ConfigError::Invalid(
                "endpoints.max_parallel は 1 以上を指定してください".to_string(),
            ));
        }
        if self.cli.program.trim().is_empty() {
            return Err(ConfigError::Invalid("cli.program が空です".to_string()));
        }
        Ok(())
    }
}

/// グローバル設定ディレクトリ (~/.config/provflow)
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("provflow"))
}

/// provflow.yaml を探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 PROVFLOW_CONFIG_PATH (直接パス指定、存在しなければエラー)
/// 2. カレントディレクトリ: provflow.yaml, .provflow.yaml
/// 3. ./.provflow/provflow.yaml
/// 4. ~/.config/provflow/provflow.yaml (グローバル設定)
///
/// どこにもなければ `None`。
pub fn find_config_file() -> Result<Option<PathBuf>> {
    // 1. 環境変数で直接指定
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    // 2. カレントディレクトリで検索
    let current_dir = std::env::current_dir()?;
    for filename in CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    // 3. ./.provflow/ ディレクトリ
    let local = current_dir.join(".provflow").join("provflow.yaml");
    if local.exists() {
        return Ok(Some(local));
    }

    // 4. グローバル設定
    if let Some(config_dir) = get_config_dir() {
        let global = config_dir.join("provflow.yaml");
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}
