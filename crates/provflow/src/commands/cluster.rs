use crate::context::AppContext;
use crate::logger::{ProvisionLogger, ProvisionStep};
use crate::utils::{load_descriptor, print_done, print_json};
use colored::Colorize;
use provflow_azure::{AzureProvisioner, ClusterOptions};
use std::path::Path;

pub async fn handle_create(ctx: &AppContext, descriptor: &Path) -> anyhow::Result<()> {
    let cluster: ClusterOptions = load_descriptor(descriptor)?;
    cluster.validate()?;
    let cli = ctx.cli()?;

    println!(
        "{}",
        format!("クラスタ '{}' を作成中...", cluster.cluster_name).blue()
    );
    let output = ctx.cancellable(cli.create_cluster(&cluster)).await?;
    print_done(
        &format!("クラスタ '{}' を作成しました", cluster.cluster_name.cyan()),
        &output,
    )
}

/// ストレージコンテナとクラスタを作成し、目標状態まで待機
pub async fn handle_provision(
    ctx: &AppContext,
    descriptor: &Path,
    target_state: &str,
) -> anyhow::Result<()> {
    let cluster: ClusterOptions = load_descriptor(descriptor)?;
    let provisioner = ctx.provisioner()?;
    let mut logger = ProvisionLogger::new();

    println!(
        "{}",
        format!("▶ クラスタ '{}' をプロビジョニング中...", cluster.cluster_name)
            .green()
            .bold()
    );
    println!();

    let result = provision(ctx, &provisioner, &cluster, target_state, &mut logger).await;
    logger.print_summary(&cluster.cluster_name);
    result
}

async fn provision(
    ctx: &AppContext,
    provisioner: &AzureProvisioner,
    cluster: &ClusterOptions,
    target_state: &str,
    logger: &mut ProvisionLogger,
) -> anyhow::Result<()> {
    let cli = provisioner.cli();

    logger
        .run(ProvisionStep::ValidateDescriptor, async { cluster.validate() })
        .await?;

    let storage = cluster.storage();
    logger.log_detail(&format!(
        "{}/{}",
        storage.storage_account_name, storage.container_name
    ));
    logger
        .run(
            ProvisionStep::CreateStorageContainer,
            ctx.cancellable(cli.create_storage_container(&storage)),
        )
        .await?;

    logger
        .run(
            ProvisionStep::CreateCluster,
            ctx.cancellable(cli.create_cluster(cluster)),
        )
        .await?;

    logger.log_detail(&format!("target state: {target_state}"));
    logger
        .run(
            ProvisionStep::WaitClusterState,
            ctx.cancellable(provisioner.wait_cluster_state(&cluster.cluster_name, target_state)),
        )
        .await?;

    Ok(())
}

pub async fn handle_status(ctx: &AppContext, name: &str) -> anyhow::Result<()> {
    let cli = ctx.cli()?;
    let status = ctx.cancellable(cli.get_cluster_status(name)).await?;
    print_json(&status)
}

pub async fn handle_wait(ctx: &AppContext, name: &str, target_state: &str) -> anyhow::Result<()> {
    let provisioner = ctx.provisioner()?;
    println!(
        "{}",
        format!("クラスタ '{}' が {} になるまで待機中...", name, target_state).blue()
    );

    ctx.cancellable(provisioner.wait_cluster_state(name, target_state))
        .await?;
    println!(
        "{} クラスタ '{}' は {} です",
        "✓".green().bold(),
        name.cyan(),
        target_state.green()
    );
    Ok(())
}

pub async fn handle_delete(ctx: &AppContext, name: &str, location: &str) -> anyhow::Result<()> {
    let cli = ctx.cli()?;
    println!("{}", format!("クラスタ '{}' を削除中...", name).blue());

    let output = ctx.cancellable(cli.delete_cluster(name, location)).await?;
    print_done(&format!("クラスタ '{}' を削除しました", name.cyan()), &output)
}
