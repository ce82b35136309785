//! The provisioned-environment handle and its on-disk markers.

use chrono::{DateTime, Utc};
use devflow_core::config::WorkflowConfig;
use devflow_core::TaskError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::runner::Invocation;

/// Written by both `python -m venv` and `uv venv`.
pub const MARKER_FILE: &str = "pyvenv.cfg";
pub const STAMP_FILE: &str = ".devflow-install.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvState {
    Absent,
    Provisioned,
    Installed,
}

impl fmt::Display for EnvState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Absent => "absent",
            Self::Provisioned => "provisioned",
            Self::Installed => "installed",
        })
    }
}

/// Record of the last successful install into an environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallStamp {
    pub manifest_sha256: String,
    pub project: String,
    pub extras: Vec<String>,
    pub backend: String,
    pub installed_at: DateTime<Utc>,
}

/// Explicit handle to one isolated environment: where it lives and which
/// interpreter it is bound to.
#[derive(Debug, Clone)]
pub struct Environment {
    root: PathBuf,
    interpreter: String,
}

impl Environment {
    pub fn new(root: impl Into<PathBuf>, interpreter: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            interpreter: interpreter.into(),
        }
    }

    pub fn from_config(cfg: &WorkflowConfig) -> Self {
        Self::new(cfg.venv_path(), cfg.python.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Interpreter identifier requested by the operator (path, version or command).
    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn marker_path(&self) -> PathBuf {
        self.root.join(MARKER_FILE)
    }

    pub fn stamp_path(&self) -> PathBuf {
        self.root.join(STAMP_FILE)
    }

    pub fn is_provisioned(&self) -> bool {
        self.marker_path().is_file()
    }

    /// Interpreter inside the environment.
    pub fn python(&self) -> PathBuf {
        let unix = self.root.join("bin").join("python");
        let windows = self.root.join("Scripts").join("python.exe");
        if unix.exists() {
            unix
        } else if windows.exists() || cfg!(windows) {
            windows
        } else {
            unix
        }
    }

    /// Run the environment's interpreter with the environment activated.
    pub fn invocation(&self, cwd: &Path) -> Invocation {
        Invocation::new(self.python(), cwd)
            .env("VIRTUAL_ENV", self.root.to_string_lossy().to_string())
    }

    /// `key = value` pairs from `pyvenv.cfg`. Empty when unreadable.
    pub fn pyvenv_cfg(&self) -> BTreeMap<String, String> {
        std::fs::read_to_string(self.marker_path())
            .map(|c| parse_pyvenv_cfg(&c))
            .unwrap_or_default()
    }

    /// Interpreter version the environment was created with.
    pub fn recorded_version(&self) -> Option<String> {
        let cfg = self.pyvenv_cfg();
        cfg.get("version")
            .or_else(|| cfg.get("version_info"))
            .cloned()
    }

    pub fn read_stamp(&self) -> Option<InstallStamp> {
        let content = std::fs::read_to_string(self.stamp_path()).ok()?;
        match serde_json::from_str(&content) {
            Ok(stamp) => Some(stamp),
            Err(e) => {
                tracing::warn!(
                    path = %self.stamp_path().display(),
                    "Ignoring unreadable install stamp: {}",
                    e
                );
                None
            }
        }
    }

    pub fn write_stamp(&self, stamp: &InstallStamp) -> Result<(), TaskError> {
        let data = serde_json::to_string_pretty(stamp)
            .map_err(|e| TaskError::install(format!("serialize install stamp: {}", e)))?;
        std::fs::write(self.stamp_path(), data).map_err(|e| {
            TaskError::install(format!(
                "write install stamp {}: {}",
                self.stamp_path().display(),
                e
            ))
        })
    }

    /// Installed means provisioned and stamped against this exact manifest.
    pub fn is_installed_for(&self, manifest_digest: &str) -> bool {
        self.is_provisioned()
            && self
                .read_stamp()
                .is_some_and(|s| s.manifest_sha256 == manifest_digest)
    }

    pub fn state(&self, manifest_digest: Option<&str>) -> EnvState {
        if !self.is_provisioned() {
            EnvState::Absent
        } else if manifest_digest.is_some_and(|d| self.is_installed_for(d)) {
            EnvState::Installed
        } else {
            EnvState::Provisioned
        }
    }
}

fn parse_pyvenv_cfg(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let (k, v) = line.split_once('=')?;
            let k = k.trim();
            if k.is_empty() || k.starts_with('#') {
                return None;
            }
            Some((k.to_string(), v.trim().to_string()))
        })
        .collect()
}
