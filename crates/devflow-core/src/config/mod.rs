//! devflow configuration layer.
//!
//! Every environment-variable read goes through this module; the rest of the
//! workspace consumes the structured configs instead of `std::env::var`.
//!
//! - `loader`: `env_or`, `env_optional`, `env_bool` and `.env` loading
//! - `schema`: `WorkflowConfig`, `ObservabilityConfig`, `Backend`
//! - `env_keys`: key constants and their aliases

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, load_dotenv_from_dir};
pub use loader::{remove_env_var, set_env_var, ScopedEnvGuard};
pub use schema::{Backend, ObservabilityConfig, WorkflowConfig};
