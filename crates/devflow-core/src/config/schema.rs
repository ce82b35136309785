//! Config structs grouped by concern, loaded from the environment.

use super::env_keys::{observability as obv_keys, workflow as wf_keys};
use super::loader::{env_bool, env_optional, env_or};
use crate::error::TaskError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_VENV_DIR: &str = ".venv";
pub const DEFAULT_TEST_DIR: &str = "tests";

/// Tool that creates the environment and installs into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// `uv` when it is on PATH, otherwise `venv`
    #[default]
    Auto,
    Uv,
    /// `python -m venv` + `pip`
    Venv,
}

impl FromStr for Backend {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "uv" => Ok(Self::Uv),
            "venv" | "pip" => Ok(Self::Venv),
            other => Err(TaskError::Config(format!(
                "unknown backend '{}' (expected auto, uv or venv)",
                other
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Uv => "uv",
            Self::Venv => "venv",
        })
    }
}

/// Everything the task chain needs to locate the project and its environment.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub project_dir: PathBuf,
    /// Interpreter identifier as given by the operator
    pub python: String,
    /// Environment directory; relative paths are resolved against `project_dir`
    pub venv_dir: PathBuf,
    pub backend: Backend,
    /// Coverage scope override; derived from the manifest when `None`
    pub package: Option<String>,
    pub test_dir: String,
}

impl WorkflowConfig {
    /// Load from the environment. `project_dir` (from the CLI) wins over
    /// `DEVFLOW_PROJECT_DIR`, which wins over the current directory. The
    /// project's `.env` is loaded before any other key is read.
    pub fn load(project_dir: Option<PathBuf>) -> Result<Self, TaskError> {
        let cwd = std::env::current_dir()
            .map_err(|e| TaskError::Config(format!("cannot determine project dir: {}", e)))?;
        // Tools run with the project as cwd, so every derived path must be absolute.
        let project_dir = match project_dir
            .or_else(|| env_optional(wf_keys::DEVFLOW_PROJECT_DIR, &[]).map(PathBuf::from))
        {
            Some(dir) => anchor(&cwd, &dir),
            None => cwd,
        };
        super::loader::load_dotenv_from_dir(&project_dir);

        let python = env_or(wf_keys::DEVFLOW_PYTHON, wf_keys::PYTHON_ALIASES, || {
            DEFAULT_PYTHON.to_string()
        });
        let venv_dir = PathBuf::from(env_or(
            wf_keys::DEVFLOW_VENV_DIR,
            wf_keys::VENV_DIR_ALIASES,
            || DEFAULT_VENV_DIR.to_string(),
        ));
        let backend = match env_optional(wf_keys::DEVFLOW_BACKEND, &[]) {
            Some(s) => s.parse()?,
            None => Backend::Auto,
        };
        let package = env_optional(wf_keys::DEVFLOW_PACKAGE, &[]);
        let test_dir = env_or(wf_keys::DEVFLOW_TEST_DIR, &[], || {
            DEFAULT_TEST_DIR.to_string()
        });

        Ok(Self {
            project_dir,
            python,
            venv_dir,
            backend,
            package,
            test_dir,
        })
    }

    /// Apply operator overrides from the command line.
    pub fn with_overrides(
        mut self,
        python: Option<String>,
        venv_dir: Option<PathBuf>,
        backend: Option<Backend>,
        package: Option<String>,
    ) -> Self {
        if let Some(p) = python {
            self.python = p;
        }
        if let Some(v) = venv_dir {
            self.venv_dir = v;
        }
        if let Some(b) = backend {
            self.backend = b;
        }
        if package.is_some() {
            self.package = package;
        }
        self
    }

    /// Absolute (project-anchored) environment location.
    pub fn venv_path(&self) -> PathBuf {
        anchor(&self.project_dir, &self.venv_dir)
    }

    pub fn test_path(&self) -> PathBuf {
        anchor(&self.project_dir, Path::new(&self.test_dir))
    }
}

fn anchor(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

/// Observability settings: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(Self::read)
    }

    fn read() -> Self {
        Self {
            quiet: env_bool(obv_keys::DEVFLOW_QUIET, &[], false),
            log_level: env_or(obv_keys::DEVFLOW_LOG_LEVEL, &[], || {
                "devflow=info".to_string()
            }),
            log_json: env_bool(obv_keys::DEVFLOW_LOG_JSON, &[], false),
            audit_log: env_optional(obv_keys::DEVFLOW_AUDIT_LOG, &[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("uv".parse::<Backend>().unwrap(), Backend::Uv);
        assert_eq!("VENV".parse::<Backend>().unwrap(), Backend::Venv);
        assert_eq!("auto".parse::<Backend>().unwrap(), Backend::Auto);
        assert!(matches!(
            "conda".parse::<Backend>(),
            Err(TaskError::Config(_))
        ));
    }

    #[test]
    fn test_venv_path_anchoring() {
        let cfg = WorkflowConfig {
            project_dir: PathBuf::from("/work/proj"),
            python: DEFAULT_PYTHON.to_string(),
            venv_dir: PathBuf::from(".venv"),
            backend: Backend::Venv,
            package: None,
            test_dir: DEFAULT_TEST_DIR.to_string(),
        };
        assert_eq!(cfg.venv_path(), PathBuf::from("/work/proj/.venv"));
        assert_eq!(cfg.test_path(), PathBuf::from("/work/proj/tests"));

        let cfg = cfg.with_overrides(
            Some("3.12".to_string()),
            Some(PathBuf::from("/tmp/env")),
            Some(Backend::Uv),
            None,
        );
        assert_eq!(cfg.venv_path(), PathBuf::from("/tmp/env"));
        assert_eq!(cfg.python, "3.12");
        assert_eq!(cfg.backend, Backend::Uv);
    }

    #[test]
    fn test_relative_project_dir_is_made_absolute() {
        let cfg = WorkflowConfig::load(Some(PathBuf::from("sub/proj"))).unwrap();
        assert!(cfg.project_dir.is_absolute());
        assert!(cfg.project_dir.ends_with("sub/proj"));
        assert!(cfg.venv_path().is_absolute());
    }
}
