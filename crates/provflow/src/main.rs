mod commands;
mod context;
mod logger;
mod utils;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use context::AppContext;
use provflow_azure::{
    AzureCli, BlobCopyQuery, Endpoint, JobQuery, SshAuth, SshTarget, StorageContainer,
};
use provflow_config::ProvflowConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "prov")]
#[command(about = "Azure の VM・HDInsight クラスタを作って、SSH で仕上げる。", long_about = None)]
struct Cli {
    /// 実行する Azure CLI コマンドと出力を表示
    #[arg(short, long, global = true)]
    verbose: bool,

    /// 設定ファイル (既定: provflow.yaml を探索)
    #[arg(long, global = true, env = "PROVFLOW_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// 状態待ちのタイムアウト秒数
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 仮想ネットワークを操作
    #[command(subcommand)]
    Network(NetworkCommands),
    /// VM を操作
    #[command(subcommand)]
    Vm(VmCommands),
    /// VM のエンドポイントを操作
    #[command(subcommand)]
    Endpoint(EndpointCommands),
    /// HDInsight クラスタを操作
    #[command(subcommand)]
    Cluster(ClusterCommands),
    /// ストレージコンテナを操作
    #[command(subcommand)]
    Storage(StorageCommands),
    /// HDInsight ジョブを参照
    #[command(subcommand)]
    Job(JobCommands),
    /// Blob のコピー
    #[command(subcommand)]
    Blob(BlobCommands),
    /// プロビジョニングスクリプトを実行
    #[command(subcommand)]
    Script(ScriptCommands),
    /// バージョン情報を表示
    Version,
}

#[derive(Subcommand)]
enum NetworkCommands {
    /// 仮想ネットワークを作成
    Create {
        /// ネットワーク名
        name: String,
        /// リージョン (例: "East US")
        #[arg(short, long)]
        location: String,
    },
    /// 仮想ネットワークを削除
    Delete {
        /// ネットワーク名
        name: String,
    },
}

#[derive(Subcommand)]
enum VmCommands {
    /// VM を作成（起動は待たない）
    Create {
        /// VM 記述ファイル (YAML)
        descriptor: PathBuf,
    },
    /// VM を作成し、起動後にプロビジョニングスクリプトを実行
    Provision {
        /// VM 記述ファイル (YAML)
        descriptor: PathBuf,
    },
    /// VM の状態を表示
    Status {
        /// VM 名
        name: String,
    },
    /// VM が ReadyRole になるまで待機
    Wait {
        /// VM 名
        name: String,
    },
    /// VM をディスクごと削除
    Delete {
        /// VM 名
        name: String,
    },
}

#[derive(Subcommand)]
enum EndpointCommands {
    /// エンドポイントを作成
    Create {
        /// VM 名
        vm: String,
        /// 外部ポート
        external_port: u16,
        /// 内部ポート
        internal_port: u16,
        /// エンドポイント名
        #[arg(short, long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum ClusterCommands {
    /// クラスタを作成（状態は待たない）
    Create {
        /// クラスタ記述ファイル (YAML)
        descriptor: PathBuf,
    },
    /// ストレージコンテナとクラスタを作成し、目標状態まで待機
    Provision {
        /// クラスタ記述ファイル (YAML)
        descriptor: PathBuf,
        /// 目標状態
        #[arg(long, default_value = "Running")]
        state: String,
    },
    /// クラスタの状態を表示
    Status {
        /// クラスタ名
        name: String,
    },
    /// クラスタが指定状態になるまで待機
    Wait {
        /// クラスタ名
        name: String,
        /// 目標状態
        #[arg(long)]
        state: String,
    },
    /// クラスタを削除
    Delete {
        /// クラスタ名
        name: String,
        /// リージョン
        #[arg(short, long)]
        location: String,
    },
}

#[derive(Args)]
struct StorageAccountArgs {
    /// ストレージアカウント名
    #[arg(short, long)]
    account: String,
    /// ストレージアカウントキー
    #[arg(short, long, env = "AZURE_STORAGE_ACCESS_KEY", hide_env_values = true)]
    key: String,
}

#[derive(Subcommand)]
enum StorageCommands {
    /// コンテナ一覧を表示
    List {
        #[command(flatten)]
        account: StorageAccountArgs,
    },
    /// コンテナを作成
    Create {
        /// コンテナ名
        container: String,
        #[command(flatten)]
        account: StorageAccountArgs,
    },
    /// コンテナを削除
    Delete {
        /// コンテナ名
        container: String,
        #[command(flatten)]
        account: StorageAccountArgs,
    },
}

#[derive(Args)]
struct JobClusterArgs {
    /// クラスタの DNS 名
    #[arg(short, long)]
    cluster: String,
    /// クラスタのユーザー名
    #[arg(short, long)]
    user: String,
    /// クラスタのパスワード
    #[arg(short, long, env = "PROVFLOW_CLUSTER_PASSWORD", hide_env_values = true)]
    password: String,
}

impl JobClusterArgs {
    fn query(&self) -> JobQuery {
        JobQuery {
            cluster_dns_name: self.cluster.clone(),
            user_name: self.user.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Subcommand)]
enum JobCommands {
    /// ジョブ一覧を表示
    List {
        #[command(flatten)]
        cluster: JobClusterArgs,
    },
    /// ジョブの状態を表示
    Show {
        /// ジョブ ID
        job_id: String,
        #[command(flatten)]
        cluster: JobClusterArgs,
    },
}

#[derive(Subcommand)]
enum BlobCommands {
    /// Blob を別アカウントのコンテナへコピー開始
    Copy {
        /// コピー記述ファイル (YAML)
        descriptor: PathBuf,
    },
    /// コピーの進捗を表示
    CopyStatus {
        /// コピー元ストレージアカウント名
        #[arg(short, long)]
        account: String,
        /// コピー元ストレージアカウントキー
        #[arg(short, long, env = "AZURE_STORAGE_ACCESS_KEY", hide_env_values = true)]
        key: String,
        /// Blob 名
        #[arg(short, long)]
        blob: String,
        /// コンテナ名
        #[arg(short, long)]
        container: String,
    },
}

#[derive(Subcommand)]
enum ScriptCommands {
    /// スクリプトをテンプレート展開して SSH 経由で順に実行
    Run {
        /// 接続先ホスト
        host: String,
        /// 実行するスクリプト（指定順に実行）
        #[arg(required = true)]
        scripts: Vec<PathBuf>,
        /// ログインユーザー
        #[arg(short, long)]
        user: String,
        /// パスワード認証
        #[arg(
            short,
            long,
            env = "PROVFLOW_SSH_PASSWORD",
            hide_env_values = true,
            conflicts_with = "cert"
        )]
        pass: Option<String>,
        /// 秘密鍵ファイルによる認証
        #[arg(long)]
        cert: Option<PathBuf>,
        /// テンプレート変数ファイル (YAML)
        #[arg(long)]
        view: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Versionコマンドは設定ファイルが壊れていても動く
    if matches!(cli.command, Commands::Version) {
        return print_version(cli.config.as_deref()).await;
    }

    let (config, config_path) = ProvflowConfig::load(cli.config.as_deref())?;
    init_tracing(cli.verbose || config.verbose);
    if let Some(path) = &config_path {
        tracing::debug!(path = %path.display(), "Loaded config");
    }

    let ctx = AppContext::new(config, cli.verbose, cli.timeout);
    ctx.cancel_on_ctrl_c();

    match cli.command {
        Commands::Network(cmd) => match cmd {
            NetworkCommands::Create { name, location } => {
                commands::network::handle_create(&ctx, &name, &location).await
            }
            NetworkCommands::Delete { name } => commands::network::handle_delete(&ctx, &name).await,
        },
        Commands::Vm(cmd) => match cmd {
            VmCommands::Create { descriptor } => commands::vm::handle_create(&ctx, &descriptor).await,
            VmCommands::Provision { descriptor } => {
                commands::vm::handle_provision(&ctx, &descriptor).await
            }
            VmCommands::Status { name } => commands::vm::handle_status(&ctx, &name).await,
            VmCommands::Wait { name } => commands::vm::handle_wait(&ctx, &name).await,
            VmCommands::Delete { name } => commands::vm::handle_delete(&ctx, &name).await,
        },
        Commands::Endpoint(EndpointCommands::Create {
            vm,
            external_port,
            internal_port,
            name,
        }) => {
            let endpoint = Endpoint::new(name, external_port, internal_port);
            commands::endpoint::handle_create(&ctx, &vm, &endpoint).await
        }
        Commands::Cluster(cmd) => match cmd {
            ClusterCommands::Create { descriptor } => {
                commands::cluster::handle_create(&ctx, &descriptor).await
            }
            ClusterCommands::Provision { descriptor, state } => {
                commands::cluster::handle_provision(&ctx, &descriptor, &state).await
            }
            ClusterCommands::Status { name } => commands::cluster::handle_status(&ctx, &name).await,
            ClusterCommands::Wait { name, state } => {
                commands::cluster::handle_wait(&ctx, &name, &state).await
            }
            ClusterCommands::Delete { name, location } => {
                commands::cluster::handle_delete(&ctx, &name, &location).await
            }
        },
        Commands::Storage(cmd) => match cmd {
            StorageCommands::List { account } => {
                commands::storage::handle_list(&ctx, &account.account, &account.key).await
            }
            StorageCommands::Create { container, account } => {
                let storage = storage_container(container, account);
                commands::storage::handle_create(&ctx, &storage).await
            }
            StorageCommands::Delete { container, account } => {
                let storage = storage_container(container, account);
                commands::storage::handle_delete(&ctx, &storage).await
            }
        },
        Commands::Job(cmd) => match cmd {
            JobCommands::List { cluster } => commands::job::handle_list(&ctx, &cluster.query()).await,
            JobCommands::Show { job_id, cluster } => {
                commands::job::handle_show(&ctx, &cluster.query(), &job_id).await
            }
        },
        Commands::Blob(cmd) => match cmd {
            BlobCommands::Copy { descriptor } => commands::blob::handle_copy(&ctx, &descriptor).await,
            BlobCommands::CopyStatus {
                account,
                key,
                blob,
                container,
            } => {
                let query = BlobCopyQuery {
                    origin_account_key: key,
                    origin_storage_account_name: account,
                    blob,
                    container,
                };
                commands::blob::handle_copy_status(&ctx, &query).await
            }
        },
        Commands::Script(ScriptCommands::Run {
            host,
            scripts,
            user,
            pass,
            cert,
            view,
        }) => {
            let auth = match (pass, cert) {
                (_, Some(cert)) => SshAuth::Certificate(cert),
                (Some(pass), None) => SshAuth::Password(pass),
                (None, None) => anyhow::bail!("--pass か --cert のどちらかを指定してください"),
            };
            let target = SshTarget::new(host, user, auth);
            commands::script::handle_run(&ctx, target, scripts, view.as_deref()).await
        }
        Commands::Version => Ok(()),
    }
}

fn storage_container(container: String, account: StorageAccountArgs) -> StorageContainer {
    StorageContainer {
        container_name: container,
        storage_account_name: account.account,
        storage_account_key: account.key,
    }
}

/// provflow と Azure CLI のバージョンを表示
async fn print_version(config: Option<&std::path::Path>) -> anyhow::Result<()> {
    println!("provflow {}", env!("CARGO_PKG_VERSION"));

    let config = ProvflowConfig::load(config)
        .map(|(config, _)| config)
        .unwrap_or_default();
    let ctx = AppContext::new(config, false, None);
    let cli = AzureCli::new(ctx.runner()).with_program(ctx.config.cli.program.clone());

    match cli.check_installed().await {
        Ok(version) => println!("azure-cli {}", version),
        Err(e) => println!("{} {}", "⚠".yellow(), e.to_string().dimmed()),
    }
    Ok(())
}
