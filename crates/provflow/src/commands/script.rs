use crate::context::AppContext;
use crate::logger::{ProvisionLogger, ProvisionStep};
use crate::utils::load_descriptor;
use colored::Colorize;
use provflow_azure::{SshAuth, SshTarget, TemplateView};
use provflow_cloud::OneOrMany;
use std::path::{Path, PathBuf};

/// スクリプトを順に SSH で実行
pub async fn handle_run(
    ctx: &AppContext,
    target: SshTarget,
    scripts: Vec<PathBuf>,
    view: Option<&Path>,
) -> anyhow::Result<()> {
    let view: Option<TemplateView> = view.map(load_descriptor::<TemplateView>).transpose()?;
    let provisioner = ctx.provisioner()?;
    let mut logger = ProvisionLogger::new();

    let auth = match &target.auth {
        SshAuth::Password(_) => "password".to_string(),
        SshAuth::Certificate(key) => key.display().to_string(),
    };
    println!(
        "{}",
        format!("SSHで {} に接続中... ({})", target.destination(), auth).blue()
    );
    for script in &scripts {
        logger.log_detail(&script.display().to_string());
    }

    let outputs = logger
        .run(
            ProvisionStep::RunScripts,
            ctx.cancellable(provisioner.run_provisioning_scripts(
                &target,
                OneOrMany::Many(scripts.clone()),
                view.as_ref(),
            )),
        )
        .await;
    logger.print_summary(&target.host);

    for (path, output) in scripts.iter().zip(outputs?) {
        println!("{}", format!("--- {} ---", path.display()).dimmed());
        print!("{output}");
    }
    Ok(())
}
