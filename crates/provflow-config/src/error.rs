use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ファイルが見つかりません: {}", .0.display())]
    ConfigFileNotFound(PathBuf),

    #[error("設定ファイルの解析に失敗しました ({}): {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("設定値が不正です: {0}")]
    Invalid(String),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
