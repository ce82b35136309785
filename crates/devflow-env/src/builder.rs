//! Provision the environment (venv / uv) and install the project into it.

use chrono::Utc;
use devflow_core::config::Backend;
use devflow_core::manifest::{ProjectManifest, DEV_GROUP};
use devflow_core::TaskError;
use std::path::Path;

use crate::environment::{Environment, InstallStamp};
use crate::runner::{CommandRunner, ExecutionResult, Invocation};
use crate::runtime_resolver::{resolve_backend, InterpreterResolver, ResolvedBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyPresent,
}

/// Creates and fills environments through the injected runner and resolver.
pub struct EnvBuilder<'a> {
    runner: &'a dyn CommandRunner,
    resolver: &'a dyn InterpreterResolver,
    backend: Backend,
}

impl<'a> EnvBuilder<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        resolver: &'a dyn InterpreterResolver,
        backend: Backend,
    ) -> Self {
        Self {
            runner,
            resolver,
            backend,
        }
    }

    /// Ensure an environment exists at `env.root()`. A present marker makes
    /// this a no-op.
    pub fn provision(&self, env: &Environment, cwd: &Path) -> Result<ProvisionOutcome, TaskError> {
        if env.is_provisioned() {
            tracing::debug!(path = %env.root().display(), "Environment already present");
            return Ok(ProvisionOutcome::AlreadyPresent);
        }

        let backend = resolve_backend(self.backend, self.resolver)?;
        if let Some(parent) = env.root().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    TaskError::provisioning(format!("create {}: {}", parent.display(), e))
                })?;
            }
        }

        let invocation = match &backend {
            ResolvedBackend::Uv { uv } => Invocation::new(uv, cwd)
                .args(["venv", "--python", env.interpreter()])
                .arg(env.root()),
            ResolvedBackend::Venv => {
                let python = self
                    .resolver
                    .resolve_interpreter(env.interpreter())
                    .ok_or_else(|| {
                        TaskError::provisioning(format!(
                            "interpreter '{}' not found",
                            env.interpreter()
                        ))
                    })?;
                Invocation::new(python, cwd).args(["-m", "venv"]).arg(env.root())
            }
        };

        tracing::info!(
            path = %env.root().display(),
            backend = backend.name(),
            interpreter = env.interpreter(),
            "Creating environment"
        );
        let out = self.runner.run(&invocation).map_err(|e| {
            TaskError::provisioning(format!("failed to run {}: {}", invocation.display(), e))
        })?;
        if !out.success() {
            return Err(TaskError::Provisioning {
                message: tool_failure(&invocation, &out),
                exit_code: Some(out.exit_code),
            });
        }
        if !env.is_provisioned() {
            return Err(TaskError::provisioning(format!(
                "{} succeeded but {} is missing",
                invocation.display(),
                env.marker_path().display()
            )));
        }
        Ok(ProvisionOutcome::Created)
    }

    /// Install the project (editable) plus its dev group. Refuses to run
    /// against an environment that has not been provisioned.
    pub fn install(
        &self,
        env: &Environment,
        project_dir: &Path,
        manifest: &ProjectManifest,
    ) -> Result<(), TaskError> {
        if !env.is_provisioned() {
            return Err(TaskError::provisioning(format!(
                "no environment at {}; run provision-environment first",
                env.root().display()
            )));
        }

        let backend = resolve_backend(self.backend, self.resolver)?;
        let target = manifest.editable_target();
        let invocation = match &backend {
            ResolvedBackend::Uv { uv } => Invocation::new(uv, project_dir)
                .args(["pip", "install", "--python"])
                .arg(env.python())
                .args(["-e", target.as_str()]),
            ResolvedBackend::Venv => env
                .invocation(project_dir)
                .args(["-m", "pip", "install", "-e", target.as_str()]),
        };

        tracing::info!(
            project = %manifest.name,
            dev = manifest.dev_dependencies.len(),
            "Installing project in editable mode"
        );
        let out = self
            .runner
            .run(&invocation)
            .map_err(|e| {
                TaskError::install(format!("failed to run {}: {}", invocation.display(), e))
            })?;
        if !out.success() {
            return Err(TaskError::Install {
                message: tool_failure(&invocation, &out),
                exit_code: Some(out.exit_code),
            });
        }

        env.write_stamp(&InstallStamp {
            manifest_sha256: manifest.digest.clone(),
            project: manifest.name.clone(),
            extras: vec![DEV_GROUP.to_string()],
            backend: backend.name().to_string(),
            installed_at: Utc::now(),
        })
    }
}

fn tool_failure(invocation: &Invocation, out: &ExecutionResult) -> String {
    let detail = out.stderr.trim();
    if detail.is_empty() {
        format!("{} exited with code {}", invocation.display(), out.exit_code)
    } else {
        format!(
            "{} exited with code {}: {}",
            invocation.display(),
            out.exit_code,
            detail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvState;
    use crate::testing::{exit, ScriptedRunner, StaticResolver};

    const MANIFEST: &str = "[project]\nname = \"keeks-elote\"\n[project.optional-dependencies]\ndev = [\"pytest\", \"ruff\"]\n";

    fn manifest(dir: &Path) -> ProjectManifest {
        std::fs::write(dir.join("pyproject.toml"), MANIFEST).unwrap();
        ProjectManifest::load(dir).unwrap()
    }

    #[test]
    fn test_provision_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let env = Environment::new(tmp.path().join(".venv"), "python3");
        let runner = ScriptedRunner::new();
        let resolver = StaticResolver::default();
        let builder = EnvBuilder::new(&runner, &resolver, Backend::Venv);

        assert_eq!(builder.provision(&env, tmp.path()).unwrap(), ProvisionOutcome::Created);
        assert_eq!(
            builder.provision(&env, tmp.path()).unwrap(),
            ProvisionOutcome::AlreadyPresent
        );
        assert_eq!(runner.count("-m venv"), 1);
        assert!(env.is_provisioned());
    }

    #[test]
    fn test_provision_uses_uv_with_interpreter_identifier() {
        let tmp = tempfile::tempdir().unwrap();
        let env = Environment::new(tmp.path().join(".venv"), "3.12");
        let runner = ScriptedRunner::new();
        let resolver = StaticResolver::empty().with_tool("uv", "/usr/local/bin/uv");
        let builder = EnvBuilder::new(&runner, &resolver, Backend::Auto);

        builder.provision(&env, tmp.path()).unwrap();
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, Path::new("/usr/local/bin/uv"));
        assert_eq!(&calls[0].args[..3], &["venv", "--python", "3.12"]);
    }

    #[test]
    fn test_provision_unknown_interpreter() {
        let tmp = tempfile::tempdir().unwrap();
        let env = Environment::new(tmp.path().join(".venv"), "3.99");
        let runner = ScriptedRunner::new();
        let resolver = StaticResolver::default();
        let builder = EnvBuilder::new(&runner, &resolver, Backend::Venv);

        let err = builder.provision(&env, tmp.path()).unwrap_err();
        assert!(matches!(err, TaskError::Provisioning { .. }));
        assert!(runner.calls().is_empty());
        assert_eq!(env.state(None), EnvState::Absent);
    }

    #[test]
    fn test_provision_backend_failure_carries_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        let env = Environment::new(tmp.path().join(".venv"), "python3");
        let runner =
            ScriptedRunner::new().respond("-m venv", exit(1, "", "ensurepip is not available"));
        let resolver = StaticResolver::default();
        let builder = EnvBuilder::new(&runner, &resolver, Backend::Venv);

        let err = builder.provision(&env, tmp.path()).unwrap_err();
        assert!(err.to_string().contains("ensurepip"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_provision_without_marker_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let env = Environment::new(tmp.path().join(".venv"), "python3");
        // Backend claims success but writes nothing.
        let runner = ScriptedRunner::new().respond("-m venv", exit(0, "", ""));
        let resolver = StaticResolver::default();
        let builder = EnvBuilder::new(&runner, &resolver, Backend::Venv);

        let err = builder.provision(&env, tmp.path()).unwrap_err();
        assert!(err.to_string().contains("pyvenv.cfg"));
    }

    #[test]
    fn test_install_requires_provisioned_environment() {
        let tmp = tempfile::tempdir().unwrap();
        let m = manifest(tmp.path());
        let env = Environment::new(tmp.path().join(".venv"), "python3");
        let runner = ScriptedRunner::new();
        let resolver = StaticResolver::default();
        let builder = EnvBuilder::new(&runner, &resolver, Backend::Venv);

        let err = builder.install(&env, tmp.path(), &m).unwrap_err();
        assert!(matches!(err, TaskError::Provisioning { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_install_editable_dev_and_stamp() {
        let tmp = tempfile::tempdir().unwrap();
        let m = manifest(tmp.path());
        let env = Environment::new(tmp.path().join(".venv"), "python3");
        let runner = ScriptedRunner::new();
        let resolver = StaticResolver::default();
        let builder = EnvBuilder::new(&runner, &resolver, Backend::Venv);

        builder.provision(&env, tmp.path()).unwrap();
        builder.install(&env, tmp.path(), &m).unwrap();

        let install = runner.calls().pop().unwrap();
        assert_eq!(install.program, env.python());
        assert_eq!(install.args, vec!["-m", "pip", "install", "-e", ".[dev]"]);
        assert_eq!(install.cwd, tmp.path());
        assert_eq!(env.state(Some(&m.digest)), EnvState::Installed);
        assert_eq!(env.read_stamp().unwrap().backend, "venv");
    }

    #[test]
    fn test_install_failure_leaves_no_stamp() {
        let tmp = tempfile::tempdir().unwrap();
        let m = manifest(tmp.path());
        let env = Environment::new(tmp.path().join(".venv"), "python3");
        let runner = ScriptedRunner::new().respond(
            "pip install",
            exit(1, "", "ERROR: No matching distribution found for keeks"),
        );
        let resolver = StaticResolver::default();
        let builder = EnvBuilder::new(&runner, &resolver, Backend::Venv);

        builder.provision(&env, tmp.path()).unwrap();
        let err = builder.install(&env, tmp.path(), &m).unwrap_err();
        assert!(matches!(err, TaskError::Install { exit_code: Some(1), .. }));
        assert!(err.to_string().contains("No matching distribution"));
        assert_eq!(env.state(Some(&m.digest)), EnvState::Provisioned);
    }
}
