//! Error taxonomy for the task chain.
//!
//! One variant per failing stage so the operator (and the exit code) can tell
//! which step broke. Tool diagnostics are echoed as-is before these errors are
//! returned; the messages here only name the stage.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    /// Environment creation failed (interpreter not found, backend failed, ...)
    #[error("provisioning failed: {message}")]
    Provisioning {
        message: String,
        exit_code: Option<i32>,
    },

    /// Manifest unusable or the package manager failed
    #[error("install failed: {message}")]
    Install {
        message: String,
        exit_code: Option<i32>,
    },

    /// Tests ran and at least one failed
    #[error("{failed} test(s) failed")]
    TestFailure { failed: usize, exit_code: i32 },

    /// Tooling itself is broken (missing interpreter, internal tool error)
    #[error("environment error: {message}")]
    Environment {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("lint reported unfixable violations (exit code {exit_code})")]
    Lint { exit_code: i32 },

    #[error("formatter failed (exit code {exit_code})")]
    Format { exit_code: i32 },

    #[error("failed to remove {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Composite failure; entries are in execution order.
    #[error("check failed: {}", summarize(.0))]
    CheckFailed(Vec<TaskError>),

    #[error("configuration error: {0}")]
    Config(String),
}

fn summarize(errors: &[TaskError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl TaskError {
    pub fn provisioning(message: impl Into<String>) -> Self {
        Self::Provisioning {
            message: message.into(),
            exit_code: None,
        }
    }

    pub fn install(message: impl Into<String>) -> Self {
        Self::Install {
            message: message.into(),
            exit_code: None,
        }
    }

    pub fn environment(message: impl Into<String>) -> Self {
        Self::Environment {
            message: message.into(),
            exit_code: None,
        }
    }

    /// Stable short name, used in audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provisioning { .. } => "provisioning",
            Self::Install { .. } => "install",
            Self::TestFailure { .. } => "test_failure",
            Self::Environment { .. } => "environment",
            Self::Lint { .. } => "lint",
            Self::Format { .. } => "format",
            Self::Cleanup { .. } => "cleanup",
            Self::CheckFailed(_) => "check_failed",
            Self::Config(_) => "config",
        }
    }

    /// Process exit code: the failing tool's code when one ran, otherwise 1.
    /// Never 0.
    pub fn exit_code(&self) -> i32 {
        let code = match self {
            Self::Provisioning { exit_code, .. }
            | Self::Install { exit_code, .. }
            | Self::Environment { exit_code, .. } => exit_code.unwrap_or(1),
            Self::TestFailure { exit_code, .. }
            | Self::Lint { exit_code }
            | Self::Format { exit_code } => *exit_code,
            Self::CheckFailed(errors) => errors.first().map_or(1, TaskError::exit_code),
            Self::Cleanup { .. } | Self::Config(_) => 1,
        };
        if code == 0 {
            1
        } else {
            code
        }
    }
}
