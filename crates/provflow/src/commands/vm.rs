use crate::context::AppContext;
use crate::logger::{ProvisionLogger, ProvisionStep};
use crate::utils::{descriptor_dir, load_descriptor, print_done, print_json};
use colored::Colorize;
use provflow_azure::{AzureProvisioner, VmOptions};
use std::path::Path;

/// VM 記述ファイルを読み込み、スクリプトのパスを記述ファイル基準で解決
fn load_vm(path: &Path) -> anyhow::Result<VmOptions> {
    let mut vm: VmOptions = load_descriptor(path)?;
    vm.resolve_scripts(descriptor_dir(path));
    Ok(vm)
}

/// VM を作成しエンドポイントを開ける（起動待ちはしない）
pub async fn handle_create(ctx: &AppContext, descriptor: &Path) -> anyhow::Result<()> {
    let vm = load_vm(descriptor)?;
    vm.validate()?;
    let provisioner = ctx.provisioner()?;

    println!("{}", format!("VM '{}' を作成中...", vm.name).blue());
    let output = ctx.cancellable(provisioner.create_vm(&vm)).await?;
    print_done(&format!("VM '{}' を作成しました", vm.name.cyan()), &output)
}

/// VM の作成から起動待ち、プロビジョニングスクリプト実行までを行う
pub async fn handle_provision(ctx: &AppContext, descriptor: &Path) -> anyhow::Result<()> {
    let vm = load_vm(descriptor)?;
    let provisioner = ctx.provisioner()?;
    let mut logger = ProvisionLogger::new();

    println!(
        "{}",
        format!("▶ VM '{}' をプロビジョニング中...", vm.name)
            .green()
            .bold()
    );
    println!();

    let result = provision(ctx, &provisioner, &vm, &mut logger).await;
    logger.print_summary(&vm.name);

    if result.is_ok() {
        println!();
        println!(
            "{} {} → {}",
            "✓".green().bold(),
            vm.name.green(),
            provisioner.host_for(&vm).yellow()
        );
    }
    result
}

async fn provision(
    ctx: &AppContext,
    provisioner: &AzureProvisioner,
    vm: &VmOptions,
    logger: &mut ProvisionLogger,
) -> anyhow::Result<()> {
    logger
        .run(ProvisionStep::ValidateDescriptor, async { vm.validate() })
        .await?;

    logger
        .run(
            ProvisionStep::CreateVm,
            ctx.cancellable(provisioner.cli().create_vm(vm)),
        )
        .await?;

    if !vm.endpoints.is_empty() {
        for endpoint in &vm.endpoints {
            logger.log_detail(&format!(
                "{}: {} → {}",
                endpoint.name, endpoint.external_port, endpoint.internal_port
            ));
        }
        logger
            .run(
                ProvisionStep::CreateEndpoints,
                ctx.cancellable(provisioner.create_endpoints(vm)),
            )
            .await?;
    }

    let status = logger
        .run(
            ProvisionStep::WaitVmRunning,
            ctx.cancellable(provisioner.wait_vm_running(&vm.name)),
        )
        .await?;
    if let Some(ip) = status.ip_address() {
        logger.log_detail(&format!("IP: {ip}"));
    }

    if let Some(scripts) = &vm.provision_script {
        let target = provisioner.ssh_target_for(vm);
        logger.log_detail(&format!(
            "{}@{} ({} scripts)",
            target.user,
            target.host,
            scripts.len()
        ));

        let outputs = logger
            .run(
                ProvisionStep::RunScripts,
                ctx.cancellable(provisioner.run_provisioning_scripts(
                    &target,
                    scripts.clone(),
                    vm.provisioning_template_view.as_ref(),
                )),
            )
            .await?;

        if ctx.config.verbose {
            for (path, output) in scripts.iter().zip(&outputs) {
                println!("{}", format!("--- {} ---", path.display()).dimmed());
                print!("{output}");
            }
        }
    }

    Ok(())
}

pub async fn handle_status(ctx: &AppContext, name: &str) -> anyhow::Result<()> {
    let cli = ctx.cli()?;
    let status = ctx.cancellable(cli.get_vm_status(name)).await?;
    print_json(&status)
}

pub async fn handle_wait(ctx: &AppContext, name: &str) -> anyhow::Result<()> {
    let provisioner = ctx.provisioner()?;
    println!("{}", format!("VM '{}' の起動を待機中...", name).blue());

    let status = ctx.cancellable(provisioner.wait_vm_running(name)).await?;
    println!(
        "{} VM '{}' は {} です",
        "✓".green().bold(),
        name.cyan(),
        status.instance_status.as_deref().unwrap_or("ReadyRole").green()
    );
    Ok(())
}

pub async fn handle_delete(ctx: &AppContext, name: &str) -> anyhow::Result<()> {
    let cli = ctx.cli()?;
    println!("{}", format!("VM '{}' を削除中...", name).blue());

    let output = ctx.cancellable(cli.delete_vm(name)).await?;
    print_done(&format!("VM '{}' を削除しました", name.cyan()), &output)
}
