//! Project manifest (`pyproject.toml`): the read-only source of truth for the
//! installer and the coverage scope.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::error::TaskError;

pub const MANIFEST_FILE_NAME: &str = "pyproject.toml";
pub const DEV_GROUP: &str = "dev";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read manifest {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("manifest {} has no [project] table", .0.display())]
    MissingProject(PathBuf),

    #[error("manifest {} does not declare a \"{group}\" optional-dependency group", .path.display())]
    MissingGroup { path: PathBuf, group: String },
}

impl From<ManifestError> for TaskError {
    fn from(e: ManifestError) -> Self {
        TaskError::install(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct PyProject {
    project: Option<ProjectTable>,
}

#[derive(Debug, Deserialize)]
struct ProjectTable {
    name: String,
    version: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default, rename = "optional-dependencies")]
    optional_dependencies: BTreeMap<String, Vec<String>>,
}

/// Parsed view of the manifest plus the digest of its raw bytes.
#[derive(Debug, Clone)]
pub struct ProjectManifest {
    pub path: PathBuf,
    pub name: String,
    pub version: Option<String>,
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
    /// SHA-256 (hex) of the manifest file contents
    pub digest: String,
}

impl ProjectManifest {
    pub fn path_in(project_dir: &Path) -> PathBuf {
        project_dir.join(MANIFEST_FILE_NAME)
    }

    /// Read and validate `<project_dir>/pyproject.toml`.
    pub fn load(project_dir: &Path) -> Result<Self, ManifestError> {
        let path = Self::path_in(project_dir);
        if !path.is_file() {
            return Err(ManifestError::Missing(path));
        }
        let content = fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self, ManifestError> {
        let doc: PyProject = toml::from_str(content).map_err(|source| ManifestError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        let mut project = doc
            .project
            .ok_or_else(|| ManifestError::MissingProject(path.to_path_buf()))?;
        let dev_dependencies = project
            .optional_dependencies
            .remove(DEV_GROUP)
            .ok_or_else(|| ManifestError::MissingGroup {
                path: path.to_path_buf(),
                group: DEV_GROUP.to_string(),
            })?;
        tracing::debug!(
            name = %project.name,
            dev = dev_dependencies.len(),
            "Parsed manifest"
        );
        Ok(Self {
            path: path.to_path_buf(),
            name: project.name,
            version: project.version,
            dependencies: project.dependencies,
            dev_dependencies,
            digest: digest(content.as_bytes()),
        })
    }

    /// Import package name used as the coverage scope: PEP 503 style
    /// separators folded to `_`, lowercased.
    pub fn package_name(&self) -> String {
        self.name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == '.' { '_' } else { c })
            .collect()
    }

    /// Editable install target for the project and its dev group, relative to
    /// the project directory.
    pub fn editable_target(&self) -> String {
        format!(".[{}]", DEV_GROUP)
    }
}

/// SHA-256 hex digest.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Digest of the manifest currently on disk, if readable.
pub fn current_digest(project_dir: &Path) -> Option<String> {
    fs::read(ProjectManifest::path_in(project_dir))
        .ok()
        .map(|b| digest(&b))
}
