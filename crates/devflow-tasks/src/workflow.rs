//! One project + one environment, wired into the task graph.

use devflow_core::config::WorkflowConfig;
use devflow_core::manifest::{self, ProjectManifest};
use devflow_core::TaskError;
use devflow_env::runtime_resolver::resolve_backend;
use devflow_env::{
    CommandRunner, EnvBuilder, EnvState, Environment, InterpreterResolver, ProvisionOutcome,
};

use crate::clean::{self, CleanOutcome};
use crate::graph::{TaskGraph, TaskId};
use crate::scheduler::{RunReport, Scheduler, TaskAction};
use crate::tools::{self, TestReport};

/// Snapshot for `devflow status`.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub location: std::path::PathBuf,
    pub state: EnvState,
    pub interpreter: String,
    /// Version recorded in `pyvenv.cfg`, when provisioned
    pub recorded_version: Option<String>,
    pub backend: String,
    pub manifest_found: bool,
}

pub struct Workflow<'a> {
    config: WorkflowConfig,
    env: Environment,
    runner: &'a dyn CommandRunner,
    resolver: &'a dyn InterpreterResolver,
    graph: TaskGraph,
    /// Passed to the requested target's tool only
    forwarded: Vec<String>,
    target: Option<TaskId>,
    last_test_report: Option<TestReport>,
}

impl<'a> Workflow<'a> {
    pub fn new(
        config: WorkflowConfig,
        runner: &'a dyn CommandRunner,
        resolver: &'a dyn InterpreterResolver,
    ) -> Self {
        let env = Environment::from_config(&config);
        Self {
            config,
            env,
            runner,
            resolver,
            graph: TaskGraph::standard(),
            forwarded: Vec::new(),
            target: None,
            last_test_report: None,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn last_test_report(&self) -> Option<&TestReport> {
        self.last_test_report.as_ref()
    }

    /// Run `target` and its stale prerequisites. `forwarded` goes to the
    /// target's tool (run-tests, run-lint, run-format).
    pub fn run(&mut self, target: TaskId, forwarded: Vec<String>) -> Result<RunReport, TaskError> {
        if !forwarded.is_empty() && !target.accepts_forwarded_args() {
            return Err(TaskError::Config(format!(
                "{} does not accept extra arguments",
                target
            )));
        }
        self.forwarded = forwarded;
        self.target = Some(target);
        let graph = self.graph.clone();
        let result = Scheduler::new(&graph).run(target, self);
        self.target = None;
        result
    }

    pub fn status(&self) -> StatusReport {
        let digest = manifest::current_digest(&self.config.project_dir);
        let backend = resolve_backend(self.config.backend, self.resolver)
            .map(|b| b.name().to_string())
            .unwrap_or_else(|e| format!("unavailable ({})", e));
        StatusReport {
            location: self.env.root().to_path_buf(),
            state: self.env.state(digest.as_deref()),
            interpreter: self.env.interpreter().to_string(),
            recorded_version: self.env.recorded_version(),
            backend,
            manifest_found: digest.is_some(),
        }
    }

    fn builder(&self) -> EnvBuilder<'_> {
        EnvBuilder::new(self.runner, self.resolver, self.config.backend)
    }

    fn forwarded_for(&self, task: TaskId) -> &[String] {
        if self.target == Some(task) {
            &self.forwarded
        } else {
            &[]
        }
    }

    fn manifest(&self) -> Result<ProjectManifest, TaskError> {
        Ok(ProjectManifest::load(&self.config.project_dir)?)
    }

    fn coverage_scope(&self) -> Result<String, TaskError> {
        match &self.config.package {
            Some(p) => Ok(p.clone()),
            None => Ok(self.manifest()?.package_name()),
        }
    }

    fn test_dir(&self) -> Option<String> {
        self.config
            .test_path()
            .is_dir()
            .then(|| self.config.test_dir.clone())
    }
}

impl TaskAction for Workflow<'_> {
    fn is_fresh(&self, task: TaskId) -> bool {
        match task {
            TaskId::Provision => self.env.is_provisioned(),
            TaskId::Install => manifest::current_digest(&self.config.project_dir)
                .is_some_and(|d| self.env.is_installed_for(&d)),
            _ => false,
        }
    }

    fn execute(&mut self, task: TaskId) -> Result<(), TaskError> {
        let project_dir = self.config.project_dir.clone();
        match task {
            TaskId::Provision => {
                let outcome = self.builder().provision(&self.env, &project_dir)?;
                if outcome == ProvisionOutcome::AlreadyPresent {
                    eprintln!("  {} already present", self.env.root().display());
                }
                Ok(())
            }
            TaskId::Install => {
                let manifest = self.manifest()?;
                self.builder().install(&self.env, &project_dir, &manifest)
            }
            TaskId::Test => {
                let package = self.coverage_scope()?;
                let test_dir = self.test_dir();
                let report = tools::run_tests(
                    self.runner,
                    &self.env,
                    &project_dir,
                    &package,
                    test_dir.as_deref(),
                    self.forwarded_for(task),
                )?;
                eprintln!("  {}", report);
                self.last_test_report = Some(report);
                Ok(())
            }
            TaskId::Lint => {
                tools::run_lint(self.runner, &self.env, &project_dir, self.forwarded_for(task))
            }
            TaskId::Format => {
                tools::run_format(self.runner, &self.env, &project_dir, self.forwarded_for(task))
            }
            // Composite: its prerequisites are the work.
            TaskId::Check => Ok(()),
            TaskId::Clean => match clean::remove_environment(&self.env)? {
                CleanOutcome::Removed { bytes } => {
                    eprintln!(
                        "  removed {} ({})",
                        self.env.root().display(),
                        clean::format_size(bytes)
                    );
                    Ok(())
                }
                CleanOutcome::Absent => Ok(()),
            },
        }
    }
}
