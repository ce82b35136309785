//! devflow CLI library: argument parsing, command dispatch and exit codes.

pub mod cli;
mod command_registry;
mod dispatch;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use devflow_core::config::WorkflowConfig;
use devflow_core::observability;
use devflow_core::TaskError;
use devflow_env::{CommandRunner, InterpreterResolver, PathResolver, SystemRunner};

use command_registry::{CommandRegistry, Context};

/// Parse the process arguments and run the command against real processes.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    // Loads the project's .env, so it must precede tracing init.
    let config = load_config(&cli)?;
    observability::init_tracing();
    execute(&cli, config, &SystemRunner::default(), &PathResolver)
}

/// Run an already-parsed command line through the given process seams.
pub fn run_with(
    cli: &Cli,
    runner: &dyn CommandRunner,
    resolver: &dyn InterpreterResolver,
) -> Result<()> {
    let config = load_config(cli)?;
    execute(cli, config, runner, resolver)
}

fn load_config(cli: &Cli) -> Result<WorkflowConfig> {
    let g = cli.global.clone();
    Ok(WorkflowConfig::load(g.project_dir)?.with_overrides(
        g.python,
        g.venv_dir,
        g.backend,
        g.package,
    ))
}

fn execute(
    cli: &Cli,
    config: WorkflowConfig,
    runner: &dyn CommandRunner,
    resolver: &dyn InterpreterResolver,
) -> Result<()> {
    let mut reg = CommandRegistry::new();
    dispatch::register_all(&mut reg);
    let ctx = Context {
        config,
        runner,
        resolver,
    };
    reg.dispatch(&cli.command, &ctx)
}

/// Process exit code for a failed command: the failing step's code when the
/// error chain carries a [`TaskError`], otherwise 1.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|e| e.downcast_ref::<TaskError>())
        .map_or(1, TaskError::exit_code)
}
