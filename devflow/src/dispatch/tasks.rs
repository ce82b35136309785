//! Graph tasks: provision-environment through clean.

use anyhow::{Context as _, Result};
use devflow_tasks::{TaskId, Workflow};

use crate::command_registry::{CommandRegistry, Context};

pub fn register(reg: &mut CommandRegistry) {
    reg.register(|cmd, ctx| {
        cmd.task()
            .map(|(task, forwarded)| run_task(ctx, task, forwarded))
    });
}

fn run_task(ctx: &Context<'_>, task: TaskId, forwarded: Vec<String>) -> Result<()> {
    let mut workflow = Workflow::new(ctx.config.clone(), ctx.runner, ctx.resolver);
    tracing::debug!(
        task = %task,
        project = %ctx.config.project_dir.display(),
        env = %workflow.environment().root().display(),
        "Dispatching"
    );
    let report = workflow
        .run(task, forwarded)
        .with_context(|| format!("{} failed", task))?;
    tracing::debug!(
        executed = report.executed.len(),
        up_to_date = report.up_to_date.len(),
        "Finished"
    );
    Ok(())
}
