use anyhow::Context;
use colored::Colorize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

/// YAML (または JSON) の記述ファイルを読み込む
pub fn load_descriptor<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("記述ファイルを読み込めません: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("記述ファイルの解析に失敗しました: {}", path.display()))
}

/// 記述ファイルのあるディレクトリ（相対パス解決用）
pub fn descriptor_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// 整形済み JSON を標準出力へ
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// 変更系コマンドの結果表示
pub fn print_done(message: &str, output: &Value) -> anyhow::Result<()> {
    println!("{} {}", "✓".green().bold(), message);
    match output {
        Value::Null => Ok(()),
        Value::String(s) if s.is_empty() => Ok(()),
        Value::String(s) => {
            println!("{}", s.dimmed());
            Ok(())
        }
        other => print_json(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provflow_azure::VmOptions;

    #[test]
    fn test_load_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("web1.yaml");
        std::fs::write(
            &path,
            "name: web1\nlocation: East US\nimageName: ubuntu\nuser: azureuser\npass: pw\n",
        )
        .unwrap();

        let vm: VmOptions = load_descriptor(&path).unwrap();
        assert_eq!(vm.name, "web1");
        assert_eq!(vm.location.as_deref(), Some("East US"));
    }

    #[test]
    fn test_load_descriptor_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yaml");
        let err = load_descriptor::<VmOptions>(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));

        let broken = dir.path().join("broken.yaml");
        std::fs::write(&broken, "name: [unclosed").unwrap();
        assert!(load_descriptor::<VmOptions>(&broken).is_err());
    }

    #[test]
    fn test_descriptor_dir() {
        assert_eq!(descriptor_dir(Path::new("web1.yaml")), Path::new("."));
        assert_eq!(descriptor_dir(Path::new("vms/web1.yaml")), Path::new("vms"));
    }
}
