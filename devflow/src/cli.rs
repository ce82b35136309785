use clap::{Args, Parser, Subcommand};
use devflow_core::config::Backend;
use devflow_tasks::TaskId;
use std::path::PathBuf;

/// devflow - provision, install, test, lint and format a Python project
#[derive(Parser, Debug)]
#[command(name = "devflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides that apply to every command.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Interpreter: a path, a version (3.11) or a command (python3)
    #[arg(long, global = true, value_name = "PYTHON")]
    pub python: Option<String>,

    /// Environment directory (relative paths are anchored at the project dir)
    #[arg(long, global = true, value_name = "DIR")]
    pub venv_dir: Option<PathBuf>,

    /// Project root containing pyproject.toml (default: current directory)
    #[arg(long, global = true, value_name = "DIR", env = "DEVFLOW_PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,

    /// Provisioning backend: auto, uv or venv
    #[arg(long, global = true, value_name = "BACKEND")]
    pub backend: Option<Backend>,

    /// Package to measure coverage for (default: derived from the manifest)
    #[arg(long, global = true, value_name = "NAME")]
    pub package: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create the isolated environment (no-op when it already exists)
    ProvisionEnvironment,

    /// Install the project in editable mode with its dev group
    InstallDependencies,

    /// Run the test suite with coverage
    RunTests {
        /// Extra pytest arguments, after `--`
        #[arg(last = true, value_name = "PYTEST_ARGS")]
        args: Vec<String>,
    },

    /// Static analysis with auto-fix
    RunLint {
        /// Extra `ruff check` arguments, after `--`
        #[arg(last = true, value_name = "RUFF_ARGS")]
        args: Vec<String>,
    },

    /// Rewrite sources to canonical style
    RunFormat {
        /// Extra `ruff format` arguments, after `--`
        #[arg(last = true, value_name = "RUFF_ARGS")]
        args: Vec<String>,
    },

    /// Lint, then format; fails if either fails
    Check,

    /// Remove the environment directory
    Clean,

    /// Show where the environment lives and what state it is in
    Status,

    /// List tasks and their prerequisites
    Tasks,
}

impl Commands {
    /// The graph task this command runs, with arguments for its tool.
    pub fn task(&self) -> Option<(TaskId, Vec<String>)> {
        let (task, args) = match self {
            Self::ProvisionEnvironment => (TaskId::Provision, None),
            Self::InstallDependencies => (TaskId::Install, None),
            Self::RunTests { args } => (TaskId::Test, Some(args)),
            Self::RunLint { args } => (TaskId::Lint, Some(args)),
            Self::RunFormat { args } => (TaskId::Format, Some(args)),
            Self::Check => (TaskId::Check, None),
            Self::Clean => (TaskId::Clean, None),
            Self::Status | Self::Tasks => return None,
        };
        Some((task, args.cloned().unwrap_or_default()))
    }
}
