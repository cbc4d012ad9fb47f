use crate::context::AppContext;
use crate::utils::print_done;
use colored::Colorize;

pub async fn handle_create(ctx: &AppContext, name: &str, location: &str) -> anyhow::Result<()> {
    let cli = ctx.cli()?;
    println!(
        "{}",
        format!("ネットワーク '{}' を {} に作成中...", name, location).blue()
    );

    let output = ctx.cancellable(cli.create_network(name, location)).await?;
    print_done(&format!("ネットワーク '{}' を作成しました", name.cyan()), &output)
}

pub async fn handle_delete(ctx: &AppContext, name: &str) -> anyhow::Result<()> {
    let cli = ctx.cli()?;
    println!("{}", format!("ネットワーク '{}' を削除中...", name).blue());

    let output = ctx.cancellable(cli.delete_network(name)).await?;
    print_done(&format!("ネットワーク '{}' を削除しました", name.cyan()), &output)
}
