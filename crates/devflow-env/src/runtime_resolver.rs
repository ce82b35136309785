//! InterpreterResolver trait: how an interpreter identifier or tool name
//! becomes an executable path.
//!
//! The default [`PathResolver`] searches `PATH`; tests substitute a fixed map.

use devflow_core::config::Backend;
use devflow_core::TaskError;
use std::path::{Path, PathBuf};

/// Extension point for locating interpreters and helper tools.
pub trait InterpreterResolver {
    /// Resolve an interpreter identifier: an existing path, a bare version
    /// (`3.11` → `python3.11`) or a command name (`python3`).
    fn resolve_interpreter(&self, identifier: &str) -> Option<PathBuf>;

    /// Locate a helper tool (e.g. `uv`) by name.
    fn find_tool(&self, name: &str) -> Option<PathBuf>;
}

/// Resolves against the host `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathResolver;

impl InterpreterResolver for PathResolver {
    fn resolve_interpreter(&self, identifier: &str) -> Option<PathBuf> {
        let as_path = Path::new(identifier);
        if as_path.components().count() > 1 || as_path.is_absolute() {
            return as_path.is_file().then(|| as_path.to_path_buf());
        }
        interpreter_candidates(identifier)
            .into_iter()
            .find_map(|name| which::which(name).ok())
    }

    fn find_tool(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }
}

/// Command names to try for an identifier, most specific first. A patch
/// version (`3.12.1`) falls back to its minor series (`python3.12`), never
/// to another minor.
pub fn interpreter_candidates(identifier: &str) -> Vec<String> {
    let id = identifier.trim();
    if !is_version(id) {
        return vec![id.to_string()];
    }
    let mut candidates = vec![format!("python{}", id)];
    let parts: Vec<&str> = id.split('.').collect();
    if parts.len() > 2 {
        candidates.push(format!("python{}.{}", parts[0], parts[1]));
    }
    candidates
}

fn is_version(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit()) && s.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Concrete provisioning backend after `auto` has been decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedBackend {
    Uv { uv: PathBuf },
    Venv,
}

impl ResolvedBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uv { .. } => "uv",
            Self::Venv => "venv",
        }
    }
}

/// `auto` prefers `uv` when it is installed; an explicit `uv` must be found.
pub fn resolve_backend(
    choice: Backend,
    resolver: &dyn InterpreterResolver,
) -> Result<ResolvedBackend, TaskError> {
    match choice {
        Backend::Auto => Ok(resolver
            .find_tool("uv")
            .map(|uv| ResolvedBackend::Uv { uv })
            .unwrap_or(ResolvedBackend::Venv)),
        Backend::Uv => resolver
            .find_tool("uv")
            .map(|uv| ResolvedBackend::Uv { uv })
            .ok_or_else(|| {
                TaskError::provisioning("backend 'uv' requested but uv was not found on PATH")
            }),
        Backend::Venv => Ok(ResolvedBackend::Venv),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticResolver;

    #[test]
    fn test_candidates() {
        assert_eq!(interpreter_candidates("3.11"), vec!["python3.11"]);
        assert_eq!(interpreter_candidates("python3"), vec!["python3"]);
        assert_eq!(interpreter_candidates("pypy3"), vec!["pypy3"]);
    }

    #[test]
    fn test_patch_version_falls_back_to_minor_series() {
        assert_eq!(interpreter_candidates("3.11.7"), vec!["python3.11.7", "python3.11"]);
        assert_eq!(interpreter_candidates(" 3.12.1 "), vec!["python3.12.1", "python3.12"]);
        assert_eq!(interpreter_candidates("3"), vec!["python3"]);
    }

    #[test]
    fn test_explicit_missing_path_does_not_fall_back_to_path_search() {
        assert!(PathResolver
            .resolve_interpreter("/definitely/missing/python3")
            .is_none());
    }

    #[test]
    fn test_auto_prefers_uv() {
        let with_uv = StaticResolver::default().with_tool("uv", "/usr/local/bin/uv");
        assert_eq!(
            resolve_backend(Backend::Auto, &with_uv).unwrap(),
            ResolvedBackend::Uv {
                uv: PathBuf::from("/usr/local/bin/uv")
            }
        );
        let without = StaticResolver::default();
        assert_eq!(
            resolve_backend(Backend::Auto, &without).unwrap(),
            ResolvedBackend::Venv
        );
    }

    #[test]
    fn test_explicit_uv_missing_is_provisioning_error() {
        let err = resolve_backend(Backend::Uv, &StaticResolver::default()).unwrap_err();
        assert!(matches!(err, TaskError::Provisioning { .. }));
    }
}
