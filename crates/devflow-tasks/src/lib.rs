//! The devflow task chain.
//!
//! - `graph`: task nodes, dependency edges and topological planning
//! - `scheduler`: runs a target's closure, skipping fresh prerequisites
//! - `tools`: pytest / ruff invocations and output parsing
//! - `clean`: environment teardown
//! - `workflow`: binds the above to one project and one environment

pub mod clean;
pub mod graph;
pub mod scheduler;
pub mod tools;
pub mod workflow;

pub use graph::{DepPolicy, GraphError, TaskGraph, TaskId, TaskNode};
pub use scheduler::{RunReport, Scheduler, TaskAction};
pub use tools::{TestOutcome, TestReport};
pub use workflow::{StatusReport, Workflow};
