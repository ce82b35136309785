//! Isolated Python environments for the task chain.
//!
//! Callers hold an [`Environment`] handle (location + interpreter) and pass it
//! into every operation; nothing here assumes a well-known directory.

pub mod builder;
pub mod environment;
pub mod runner;
pub mod runtime_resolver;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use builder::{EnvBuilder, ProvisionOutcome};
pub use environment::{EnvState, Environment, InstallStamp};
pub use runner::{CommandRunner, ExecutionResult, Invocation, SystemRunner};
pub use runtime_resolver::{InterpreterResolver, PathResolver, ResolvedBackend};
