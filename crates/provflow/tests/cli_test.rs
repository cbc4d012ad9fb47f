#![allow(deprecated)] // TODO: cargo_bin → cargo_bin_cmd! へ移行

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};

/// テスト用の偽 Azure CLI と設定ファイルを用意する
struct FakeAzure {
    dir: tempfile::TempDir,
}

impl FakeAzure {
    /// `vm_state` を `vm show` で返す偽 CLI
    fn new(vm_state: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let script = format!(
            r#"#!/bin/sh
echo "$@" >> "{log}"
if [ "$1" = "--version" ]; then
  echo "0.10.20"
  exit 0
fi
case "$1 $2" in
  "vm show")
    echo '{{"InstanceStatus":"{vm_state}","IPAddress":"10.0.0.4"}}'
    ;;
  "hdinsight cluster")
    echo '{{"state":"Running"}}'
    ;;
  "vm delete")
    echo "error: The VM was not found" >&2
    exit 1
    ;;
  *)
    echo '{{}}'
    ;;
esac
"#,
            log = log.display()
        );
        let program = dir.path().join("azure");
        std::fs::write(&program, script).unwrap();
        make_executable(&program);

        Self { dir }
    }

    fn write_config(&self, extra: &str) -> PathBuf {
        let path = self.dir.path().join("provflow.yaml");
        std::fs::write(
            &path,
            format!(
                "cli:\n  program: {}\n{extra}poll:\n  initial_delay_ms: 0\n  max_delay_ms: 0\n  max_attempts: 3\n",
                self.dir.path().join("azure").display()
            ),
        )
        .unwrap();
        path
    }

    /// 受け取ったスクリプトを記録する偽 ssh / sshpass を PATH 用ディレクトリに置く
    ///
    /// スクリプトに `FAIL` を含むと終了コード 1 で失敗する。
    fn install_ssh(&self) -> PathBuf {
        let bin = self.dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let log = self.dir.path().join("remote.log");

        let ssh = format!(
            r#"#!/bin/sh
script=$(cat)
printf '%s\n---\n' "$script" >> "{log}"
case "$script" in
  *FAIL*)
    echo "remote step failed" >&2
    exit 1
    ;;
esac
echo ok
"#,
            log = log.display()
        );
        std::fs::write(bin.join("ssh"), ssh).unwrap();
        make_executable(&bin.join("ssh"));

        let sshpass = "#!/bin/sh\n[ \"$1\" = \"-e\" ] && shift\n[ -n \"$SSHPASS\" ] || exit 5\nexec \"$@\"\n";
        std::fs::write(bin.join("sshpass"), sshpass).unwrap();
        make_executable(&bin.join("sshpass"));

        bin
    }

    /// 偽 ssh が受け取ったスクリプト（受信順）
    fn remote_scripts(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("remote.log"))
            .unwrap_or_default()
            .split("\n---\n")
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    fn write_vm_descriptor(&self, a_sh: &str, b_sh: &str) -> PathBuf {
        std::fs::write(self.path("a.sh"), a_sh).unwrap();
        std::fs::write(self.path("b.sh"), b_sh).unwrap();
        let descriptor = self.path("web1.yaml");
        std::fs::write(
            &descriptor,
            r#"name: web1
location: East US
imageName: ubuntu
user: azureuser
pass: secret
provisionScript: [a.sh, b.sh]
provisioningTemplateView:
  appPort: 8080
"#,
        )
        .unwrap();
        descriptor
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn make_executable(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).unwrap();
    }
    #[cfg(not(unix))]
    let _ = path;
}

fn prov() -> Command {
    let mut cmd = Command::cargo_bin("prov").unwrap();
    cmd.env_remove("PROVFLOW_CONFIG_PATH");
    cmd
}

/// CLIヘルプが正しく表示されることを確認
#[test]
fn test_cli_help() {
    prov()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SSH で仕上げる"))
        .stdout(predicate::str::contains("network"))
        .stdout(predicate::str::contains("vm"))
        .stdout(predicate::str::contains("cluster"))
        .stdout(predicate::str::contains("script"));
}

/// vm provision のヘルプ
#[test]
fn test_vm_provision_help() {
    prov()
        .args(["vm", "provision", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<DESCRIPTOR>"))
        .stdout(predicate::str::contains("--timeout"));
}

/// バージョン表示は Azure CLI がなくても成功する
#[test]
fn test_cli_version() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("provflow.yaml");
    std::fs::write(&config, "cli:\n  program: /nonexistent/azure\n").unwrap();

    prov()
        .args(["version", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("provflow"))
        .stdout(predicate::str::contains("not found"));
}

#[cfg(unix)]
#[test]
fn test_version_reports_azure_cli() {
    let fake = FakeAzure::new("ReadyRole");
    let config = fake.write_config("");

    prov()
        .arg("version")
        .env("PROVFLOW_CONFIG_PATH", &config)
        .assert()
        .success()
        .stdout(predicate::str::contains("azure-cli 0.10.20"));
}

#[cfg(unix)]
#[test]
fn test_vm_status_prints_record() {
    let fake = FakeAzure::new("ReadyRole");
    let config = fake.write_config("");

    prov()
        .args(["vm", "status", "web1", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"InstanceStatus\": \"ReadyRole\""));

    assert_eq!(fake.calls(), vec!["vm show web1 --json"]);
}

#[cfg(unix)]
#[test]
fn test_vm_wait_fails_on_error_state() {
    let fake = FakeAzure::new("ProvisioningFailed");
    let config = fake.write_config("");

    prov()
        .args(["vm", "wait", "web1", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ProvisioningFailed"));

    assert_eq!(fake.calls().len(), 1);
}

#[cfg(unix)]
#[test]
fn test_vm_wait_gives_up_after_max_attempts() {
    let fake = FakeAzure::new("Provisioning");
    let config = fake.write_config("");

    prov()
        .args(["vm", "wait", "web1", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Timed out"));

    assert_eq!(fake.calls().len(), 3);
}

#[cfg(unix)]
#[test]
fn test_invalid_descriptor_makes_no_cli_calls() {
    let fake = FakeAzure::new("ReadyRole");
    let config = fake.write_config("");
    let descriptor = fake.path("web1.yaml");
    std::fs::write(
        &descriptor,
        "name: web1\nnetworkName: net1\nlocation: East US\nimageName: ubuntu\nuser: u\npass: p\n",
    )
    .unwrap();

    prov()
        .args(["vm", "create"])
        .arg(&descriptor)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("both"));

    assert!(fake.calls().is_empty());
}

#[cfg(unix)]
#[test]
fn test_vm_create_opens_endpoints_in_order() {
    let fake = FakeAzure::new("ReadyRole");
    let config = fake.write_config("");
    let descriptor = fake.path("web1.yaml");
    std::fs::write(
        &descriptor,
        r#"name: web1
location: East US
imageName: ubuntu
user: azureuser
pass: secret
endpoints:
  - { name: http, externalPort: 80, internalPort: 8080 }
  - { name: https, externalPort: 443, internalPort: 8443 }
"#,
    )
    .unwrap();

    prov()
        .args(["vm", "create"])
        .arg(&descriptor)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("web1"));

    assert_eq!(
        fake.calls(),
        vec![
            "vm create web1 ubuntu azureuser secret --ssh --json --vm-name web1 --location East US",
            "vm endpoint create web1 80 8080 --name http --json",
            "vm endpoint create web1 443 8443 --name https --json",
        ]
    );
}

#[cfg(unix)]
#[test]
fn test_legacy_dialect_from_config() {
    let fake = FakeAzure::new("ReadyRole");
    let config = fake.write_config("");
    std::fs::write(
        &config,
        format!(
            "cli:\n  program: {}\n  dialect: legacy\n",
            fake.path("azure").display()
        ),
    )
    .unwrap();

    prov()
        .args(["network", "create", "net1", "--location", "East US", "--config"])
        .arg(&config)
        .assert()
        .success();

    assert_eq!(fake.calls(), vec!["network vnet create net1 -l East US"]);
}

#[cfg(unix)]
#[test]
fn test_cli_failure_surfaces_stderr() {
    let fake = FakeAzure::new("ReadyRole");
    let config = fake.write_config("");

    prov()
        .args(["vm", "delete", "web1", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("The VM was not found"));
}

#[cfg(unix)]
#[test]
fn test_cluster_wait() {
    let fake = FakeAzure::new("ReadyRole");
    let config = fake.write_config("");

    prov()
        .args(["cluster", "wait", "cl1", "--state", "Running", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Running"));

    assert_eq!(
        fake.calls(),
        vec!["hdinsight cluster show cl1 --osType linux --json"]
    );
}

fn path_with(bin: &Path) -> String {
    format!("{}:{}", bin.display(), std::env::var("PATH").unwrap_or_default())
}

#[cfg(unix)]
#[test]
fn test_vm_provision_runs_scripts_in_order() {
    let fake = FakeAzure::new("ReadyRole");
    let config = fake.write_config("");
    let bin = fake.install_ssh();
    let descriptor = fake.write_vm_descriptor("echo a {{ appPort }}", "echo b ${#ARR[@]}");

    prov()
        .env("PATH", path_with(&bin))
        .args(["vm", "provision"])
        .arg(&descriptor)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("web1.cloudapp.net"));

    assert_eq!(
        fake.calls(),
        vec![
            "vm create web1 ubuntu azureuser secret --ssh --json --vm-name web1 --location East US",
            "vm show web1 --json",
        ]
    );
    assert_eq!(fake.remote_scripts(), vec!["echo a 8080", "echo b ${#ARR[@]}"]);
}

#[cfg(unix)]
#[test]
fn test_vm_provision_stops_at_failing_script() {
    let fake = FakeAzure::new("ReadyRole");
    let config = fake.write_config("");
    let bin = fake.install_ssh();
    let descriptor = fake.write_vm_descriptor("echo FAIL", "echo b");

    prov()
        .env("PATH", path_with(&bin))
        .args(["vm", "provision"])
        .arg(&descriptor)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("remote step failed"));

    assert_eq!(fake.remote_scripts(), vec!["echo FAIL"]);
}

#[cfg(unix)]
#[test]
fn test_vm_provision_skips_scripts_on_error_state() {
    let fake = FakeAzure::new("FailedStartingVM");
    let config = fake.write_config("");
    let bin = fake.install_ssh();
    let descriptor = fake.write_vm_descriptor("echo a", "echo b");

    prov()
        .env("PATH", path_with(&bin))
        .args(["vm", "provision"])
        .arg(&descriptor)
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("FailedStartingVM"));

    assert!(fake.remote_scripts().is_empty());
}

/// 明示指定した設定ファイルがなければエラー
#[test]
fn test_missing_config_file() {
    prov()
        .args(["vm", "status", "web1", "--config", "/nonexistent/provflow.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("設定ファイルが見つかりません"));
}

/// Azure CLI が見つからない場合
#[test]
fn test_missing_azure_cli() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("provflow.yaml");
    std::fs::write(&config, "cli:\n  program: /nonexistent/azure\n").unwrap();

    prov()
        .args(["vm", "status", "web1", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to spawn"));
}

/// script run は認証方式が必須
#[test]
fn test_script_run_requires_auth() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("setup.sh");
    std::fs::write(&script, "echo hi").unwrap();

    prov()
        .current_dir(dir.path())
        .env_remove("PROVFLOW_SSH_PASSWORD")
        .args(["script", "run", "vm1.cloudapp.net"])
        .arg(&script)
        .args(["--user", "azureuser"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--pass"));
}
