use devflow_core::observability;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Captured result of one external tool run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code; -1 when the process was terminated by a signal
    pub exit_code: i32,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr, for parsers that do not care which stream
    /// a line came from.
    pub fn combined(&self) -> String {
        let mut s = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        s.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') {
            s.push('\n');
        }
        s.push_str(&self.stderr);
        s
    }
}

/// A fully specified external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_string_lossy().to_string()));
        self
    }

    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }

    /// Shell-like rendering for logs and error messages.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().map(|a| {
            if a.contains(' ') {
                format!("\"{}\"", a)
            } else {
                a.clone()
            }
        }));
        parts.join(" ")
    }
}

/// Seam between the task chain and the operating system. Everything that
/// spawns a tool goes through this trait.
pub trait CommandRunner {
    /// Run to completion. `Err` means the process could not be spawned;
    /// a non-zero exit is reported through [`ExecutionResult::exit_code`].
    fn run(&self, invocation: &Invocation) -> io::Result<ExecutionResult>;
}

/// Spawns real processes. With `echo`, captured output is replayed to the
/// operator's stdout/stderr after the tool exits.
#[derive(Debug, Clone, Copy)]
pub struct SystemRunner {
    pub echo: bool,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self { echo: true }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ExecutionResult> {
        observability::audit_command_invoked(
            &invocation.program.to_string_lossy(),
            &invocation.args,
            &invocation.cwd.to_string_lossy(),
        );
        tracing::info!(cmd = %invocation.display(), "Running");

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .output()?;

        let result = ExecutionResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        if self.echo {
            let _ = io::stdout().write_all(result.stdout.as_bytes());
            let _ = io::stderr().write_all(result.stderr.as_bytes());
        }
        tracing::debug!(exit_code = result.exit_code, "Finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_display_quotes_spaces() {
        let inv = Invocation::new("/venv/bin/python", Path::new("/proj"))
            .args(["-m", "pip", "install"])
            .arg("my dir");
        assert_eq!(
            inv.display(),
            "/venv/bin/python -m pip install \"my dir\""
        );
    }

    #[test]
    fn test_combined_output_joins_streams() {
        let r = ExecutionResult {
            stdout: "a".into(),
            stderr: "b\n".into(),
            exit_code: 0,
        };
        assert_eq!(r.combined(), "a\nb\n");
        assert!(r.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_reports_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = SystemRunner { echo: false };
        let ok = runner
            .run(&Invocation::new("sh", tmp.path()).args(["-c", "echo hi; exit 3"]))
            .unwrap();
        assert_eq!(ok.exit_code, 3);
        assert_eq!(ok.stdout.trim(), "hi");

        let with_env = runner
            .run(
                &Invocation::new("sh", tmp.path())
                    .args(["-c", "echo $VIRTUAL_ENV"])
                    .env("VIRTUAL_ENV", "/proj/.venv"),
            )
            .unwrap();
        assert_eq!(with_env.stdout.trim(), "/proj/.venv");

        let missing = runner.run(&Invocation::new("definitely-not-a-real-tool-xyz", tmp.path()));
        assert!(missing.is_err());
    }
}
