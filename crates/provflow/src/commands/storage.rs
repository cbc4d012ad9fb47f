use crate::context::AppContext;
use crate::utils::{print_done, print_json};
use colored::Colorize;
use provflow_azure::StorageContainer;

pub async fn handle_list(ctx: &AppContext, account: &str, key: &str) -> anyhow::Result<()> {
    let cli = ctx.cli()?;
    let containers = ctx
        .cancellable(cli.list_storage_containers(account, key))
        .await?;
    print_json(&containers)
}

pub async fn handle_create(ctx: &AppContext, storage: &StorageContainer) -> anyhow::Result<()> {
    let cli = ctx.cli()?;
    println!(
        "{}",
        format!(
            "コンテナ '{}' を {} に作成中...",
            storage.container_name, storage.storage_account_name
        )
        .blue()
    );

    let output = ctx.cancellable(cli.create_storage_container(storage)).await?;
    print_done(
        &format!("コンテナ '{}' を作成しました", storage.container_name.cyan()),
        &output,
    )
}

pub async fn handle_delete(ctx: &AppContext, storage: &StorageContainer) -> anyhow::Result<()> {
    let cli = ctx.cli()?;
    println!(
        "{}",
        format!("コンテナ '{}' を削除中...", storage.container_name).blue()
    );

    let output = ctx.cancellable(cli.delete_storage_container(storage)).await?;
    print_done(
        &format!("コンテナ '{}' を削除しました", storage.container_name.cyan()),
        &output,
    )
}
