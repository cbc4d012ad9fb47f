use crate::context::AppContext;
use crate::utils::print_done;
use colored::Colorize;
use provflow_azure::Endpoint;

pub async fn handle_create(
    ctx: &AppContext,
    vm_name: &str,
    endpoint: &Endpoint,
) -> anyhow::Result<()> {
    endpoint.validate()?;
    let cli = ctx.cli()?;
    println!(
        "{}",
        format!(
            "VM '{}' にエンドポイント '{}' ({} → {}) を作成中...",
            vm_name, endpoint.name, endpoint.external_port, endpoint.internal_port
        )
        .blue()
    );

    let output = ctx.cancellable(cli.create_endpoint(vm_name, endpoint)).await?;
    print_done(
        &format!("エンドポイント '{}' を作成しました", endpoint.name.cyan()),
        &output,
    )
}
