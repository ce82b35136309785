pub mod config;
pub mod error;
pub mod manifest;
pub mod observability;

pub use error::TaskError;
pub use manifest::{ManifestError, ProjectManifest};
