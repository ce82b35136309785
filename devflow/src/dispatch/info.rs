//! Read-only commands: `status` and `tasks`.

use anyhow::Result;
use devflow_env::EnvState;
use devflow_tasks::{StatusReport, TaskGraph, Workflow};
use std::fmt::Write as _;

use crate::cli::Commands;
use crate::command_registry::{CommandRegistry, Context};

pub fn register(reg: &mut CommandRegistry) {
    reg.register(|cmd, ctx| match cmd {
        Commands::Status => Some(cmd_status(ctx)),
        Commands::Tasks => Some(cmd_tasks()),
        _ => None,
    });
}

fn cmd_status(ctx: &Context<'_>) -> Result<()> {
    let workflow = Workflow::new(ctx.config.clone(), ctx.runner, ctx.resolver);
    print!("{}", render_status(&workflow.status()));
    Ok(())
}

fn cmd_tasks() -> Result<()> {
    print!("{}", render_tasks(&TaskGraph::standard()));
    Ok(())
}

pub(crate) fn render_status(report: &StatusReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "environment: {}", report.location.display());
    let _ = writeln!(out, "state:       {}", report.state);
    match &report.recorded_version {
        Some(v) => {
            let _ = writeln!(out, "interpreter: {} ({})", report.interpreter, v);
        }
        None => {
            let _ = writeln!(out, "interpreter: {}", report.interpreter);
        }
    }
    let _ = writeln!(out, "backend:     {}", report.backend);
    let install = match (report.manifest_found, report.state) {
        (false, _) => "no pyproject.toml",
        (true, EnvState::Installed) => "up to date",
        (true, EnvState::Provisioned) => "stale (manifest changed or never installed)",
        (true, EnvState::Absent) => "not installed",
    };
    let _ = writeln!(out, "install:     {}", install);
    out
}

pub(crate) fn render_tasks(graph: &TaskGraph) -> String {
    let mut out = String::new();
    for node in graph.nodes() {
        let _ = writeln!(out, "{:<22} {}", node.id.name(), node.description);
        if !node.deps.is_empty() {
            let deps: Vec<_> = node.deps.iter().map(|d| d.name()).collect();
            let _ = writeln!(out, "{:<22}   needs: {}", "", deps.join(", "));
        }
    }
    out
}
