use crate::context::AppContext;
use crate::utils::{load_descriptor, print_done, print_json};
use colored::Colorize;
use provflow_azure::{BlobCopy, BlobCopyQuery};
use std::path::Path;

/// 記述ファイルに従って blob のコピーを開始
pub async fn handle_copy(ctx: &AppContext, descriptor: &Path) -> anyhow::Result<()> {
    let copy: BlobCopy = load_descriptor(descriptor)?;
    copy.validate()?;
    let cli = ctx.cli()?;
    println!(
        "{}",
        format!(
            "{} を {}/{} にコピー開始...",
            copy.origin_uri, copy.destination_storage_account_name, copy.destination_container
        )
        .blue()
    );

    let output = ctx.cancellable(cli.copy_dataset(&copy)).await?;
    print_done(
        &format!("コピーを開始しました ({})", copy.destination_container.cyan()),
        &output,
    )
}

pub async fn handle_copy_status(ctx: &AppContext, query: &BlobCopyQuery) -> anyhow::Result<()> {
    let cli = ctx.cli()?;
    let status = ctx.cancellable(cli.copy_dataset_status(query)).await?;
    print_json(&status)
}
