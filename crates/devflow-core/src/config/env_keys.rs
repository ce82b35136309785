//! Environment variable keys and their aliases.
//!
//! Primary keys use the `DEVFLOW_*` prefix. Aliases accept the conventional
//! names (`PYTHON_VERSION`, `VENV`).

/// Interpreter and environment location
pub mod workflow {
    /// Interpreter identifier: a path, a version (`3.11`) or a command (`python3`)
    pub const DEVFLOW_PYTHON: &str = "DEVFLOW_PYTHON";
    pub const PYTHON_ALIASES: &[&str] = &["PYTHON_VERSION", "PYTHON"];

    pub const DEVFLOW_VENV_DIR: &str = "DEVFLOW_VENV_DIR";
    pub const VENV_DIR_ALIASES: &[&str] = &["VENV_DIR", "VENV"];

    pub const DEVFLOW_PROJECT_DIR: &str = "DEVFLOW_PROJECT_DIR";

    /// Provisioning backend: "auto", "uv" or "venv"
    pub const DEVFLOW_BACKEND: &str = "DEVFLOW_BACKEND";

    /// Coverage scope override (import package name)
    pub const DEVFLOW_PACKAGE: &str = "DEVFLOW_PACKAGE";

    pub const DEVFLOW_TEST_DIR: &str = "DEVFLOW_TEST_DIR";
}

/// Logging and audit
pub mod observability {
    pub const DEVFLOW_QUIET: &str = "DEVFLOW_QUIET";
    pub const DEVFLOW_LOG_LEVEL: &str = "DEVFLOW_LOG_LEVEL";
    pub const DEVFLOW_LOG_JSON: &str = "DEVFLOW_LOG_JSON";
    pub const DEVFLOW_AUDIT_LOG: &str = "DEVFLOW_AUDIT_LOG";
}
