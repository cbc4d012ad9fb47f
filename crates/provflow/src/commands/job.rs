use crate::context::AppContext;
use crate::utils::print_json;
use provflow_azure::JobQuery;

pub async fn handle_list(ctx: &AppContext, query: &JobQuery) -> anyhow::Result<()> {
    let cli = ctx.cli()?;
    let jobs = ctx.cancellable(cli.list_jobs(query)).await?;
    print_json(&jobs)
}

pub async fn handle_show(ctx: &AppContext, query: &JobQuery, job_id: &str) -> anyhow::Result<()> {
    let cli = ctx.cli()?;
    let job = ctx.cancellable(cli.job_status(query, job_id)).await?;
    print_json(&job)
}
