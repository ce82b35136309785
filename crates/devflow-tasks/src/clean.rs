//! Environment teardown.

use devflow_core::TaskError;
use devflow_env::Environment;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanOutcome {
    Removed { bytes: u64 },
    /// Nothing at the configured location
    Absent,
}

/// Remove the environment directory wholesale. An absent directory is a
/// successful no-op; on failure the directory is left where it is.
pub fn remove_environment(env: &Environment) -> Result<CleanOutcome, TaskError> {
    remove_with(env, |root| fs::remove_dir_all(root))
}

fn remove_with(
    env: &Environment,
    remove: impl FnOnce(&Path) -> std::io::Result<()>,
) -> Result<CleanOutcome, TaskError> {
    let root = env.root();
    match fs::symlink_metadata(root) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %root.display(), "Nothing to clean");
            return Ok(CleanOutcome::Absent);
        }
        Err(source) => {
            return Err(TaskError::Cleanup {
                path: root.to_path_buf(),
                source,
            })
        }
    }

    let bytes = dir_size(root);
    remove(root).map_err(|source| TaskError::Cleanup {
        path: root.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %root.display(), freed = %format_size(bytes), "Removed environment");
    Ok(CleanOutcome::Removed { bytes })
}

/// Total size of a directory tree; unreadable entries count as zero.
pub fn dir_size(path: &Path) -> u64 {
    let mut total: u64 = 0;
    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            let p = entry.path();
            match entry.file_type() {
                Ok(t) if t.is_dir() => total += dir_size(&p),
                Ok(_) => total += entry.metadata().map(|m| m.len()).unwrap_or(0),
                Err(_) => {}
            }
        }
    }
    total
}

/// Human-readable byte size.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_environment() {
        let tmp = tempfile::tempdir().unwrap();
        let env = Environment::new(tmp.path().join(".venv"), "python3");
        fs::create_dir_all(env.root().join("lib")).unwrap();
        fs::write(env.marker_path(), "version = 3.11.4\n").unwrap();
        fs::write(env.root().join("lib").join("blob"), vec![0u8; 2048]).unwrap();

        let outcome = remove_environment(&env).unwrap();
        assert!(matches!(outcome, CleanOutcome::Removed { bytes } if bytes >= 2048));
        assert!(!env.root().exists());
    }

    #[test]
    fn test_clean_absent_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let env = Environment::new(tmp.path().join(".venv"), "python3");
        assert_eq!(remove_environment(&env).unwrap(), CleanOutcome::Absent);
        assert_eq!(remove_environment(&env).unwrap(), CleanOutcome::Absent);
    }

    #[test]
    fn test_clean_failure_leaves_path_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        // A regular file where the environment directory should be.
        let path = tmp.path().join(".venv");
        fs::write(&path, "not a directory").unwrap();
        let env = Environment::new(&path, "python3");

        let err = remove_environment(&env).unwrap_err();
        assert!(matches!(err, TaskError::Cleanup { .. }));
        assert_ne!(err.exit_code(), 0);
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let env = Environment::new(tmp.path().join(".venv"), "python3");
        fs::create_dir_all(env.root()).unwrap();
        fs::write(env.marker_path(), "version = 3.11.4\n").unwrap();
        fs::set_permissions(env.root(), fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users bypass permission bits; the denied-removal test
        // below covers that case.
        if fs::read_dir(env.root()).is_ok() {
            fs::set_permissions(env.root(), fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = remove_environment(&env);
        fs::set_permissions(env.root(), fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(result, Err(TaskError::Cleanup { .. })));
        assert!(env.root().exists());
    }

    #[test]
    fn test_clean_permission_denied_leaves_environment() {
        let tmp = tempfile::tempdir().unwrap();
        let env = Environment::new(tmp.path().join(".venv"), "python3");
        fs::create_dir_all(env.root()).unwrap();
        fs::write(env.marker_path(), "version = 3.11.4\n").unwrap();

        let err = remove_with(&env, |_| Err(std::io::Error::from(ErrorKind::PermissionDenied)))
            .unwrap_err();
        match &err {
            TaskError::Cleanup { path, source } => {
                assert_eq!(path, env.root());
                assert_eq!(source.kind(), ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_ne!(err.exit_code(), 0);
        assert!(env.is_provisioned());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
