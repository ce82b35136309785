//! Task nodes and their prerequisite edges.

use devflow_core::TaskError;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskId {
    Provision,
    Install,
    Test,
    Lint,
    Format,
    Check,
    Clean,
}

impl TaskId {
    pub const ALL: [TaskId; 7] = [
        TaskId::Provision,
        TaskId::Install,
        TaskId::Test,
        TaskId::Lint,
        TaskId::Format,
        TaskId::Check,
        TaskId::Clean,
    ];

    /// Operator-facing task name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Provision => "provision-environment",
            Self::Install => "install-dependencies",
            Self::Test => "run-tests",
            Self::Lint => "run-lint",
            Self::Format => "run-format",
            Self::Check => "check",
            Self::Clean => "clean",
        }
    }

    /// Whether trailing `-- args` are passed through to this task's tool.
    pub fn accepts_forwarded_args(&self) -> bool {
        matches!(self, Self::Test | Self::Lint | Self::Format)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TaskId {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskId::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| GraphError::UnknownTask(s.to_string()))
    }
}

/// How a node reacts to a failed prerequisite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepPolicy {
    /// Stop at the first failed prerequisite; the node does not run.
    FailFast,
    /// Attempt every prerequisite, then fail with all their errors.
    RunAll,
}

#[derive(Debug, Clone)]
pub struct TaskNode {
    pub id: TaskId,
    /// Prerequisites, in execution order
    pub deps: Vec<TaskId>,
    pub policy: DepPolicy,
    pub description: &'static str,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("dependency cycle: {}", render_cycle(.0))]
    Cycle(Vec<TaskId>),
}

fn render_cycle(path: &[TaskId]) -> String {
    path.iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl From<GraphError> for TaskError {
    fn from(e: GraphError) -> Self {
        TaskError::Config(e.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskId, TaskNode>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: TaskNode) -> &mut Self {
        self.nodes.insert(node.id, node);
        self
    }

    /// The dev-workflow chain: provision → install → {test, lint, format} →
    /// check, plus the independent clean.
    pub fn standard() -> Self {
        let mut g = Self::new();
        g.add(TaskNode {
            id: TaskId::Provision,
            deps: vec![],
            policy: DepPolicy::FailFast,
            description: "create the isolated environment",
        })
        .add(TaskNode {
            id: TaskId::Install,
            deps: vec![TaskId::Provision],
            policy: DepPolicy::FailFast,
            description: "install the project (editable) with its dev group",
        })
        .add(TaskNode {
            id: TaskId::Test,
            deps: vec![TaskId::Install],
            policy: DepPolicy::FailFast,
            description: "run the test suite with coverage",
        })
        .add(TaskNode {
            id: TaskId::Lint,
            deps: vec![TaskId::Install],
            policy: DepPolicy::FailFast,
            description: "static analysis with auto-fix",
        })
        .add(TaskNode {
            id: TaskId::Format,
            deps: vec![TaskId::Install],
            policy: DepPolicy::FailFast,
            description: "rewrite sources to canonical style",
        })
        .add(TaskNode {
            id: TaskId::Check,
            deps: vec![TaskId::Lint, TaskId::Format],
            policy: DepPolicy::RunAll,
            description: "lint, then format",
        })
        .add(TaskNode {
            id: TaskId::Clean,
            deps: vec![],
            policy: DepPolicy::FailFast,
            description: "remove the environment directory",
        });
        g
    }

    pub fn node(&self, id: TaskId) -> Result<&TaskNode, GraphError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| GraphError::UnknownTask(id.name().to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    /// Topological order of `target` and everything it depends on
    /// (prerequisites first, `target` last).
    pub fn plan(&self, target: TaskId) -> Result<Vec<TaskId>, GraphError> {
        let mut order = Vec::new();
        let mut done = HashSet::new();
        let mut stack = Vec::new();
        self.visit(target, &mut stack, &mut done, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        id: TaskId,
        stack: &mut Vec<TaskId>,
        done: &mut HashSet<TaskId>,
        order: &mut Vec<TaskId>,
    ) -> Result<(), GraphError> {
        if done.contains(&id) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|t| *t == id) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(id);
            return Err(GraphError::Cycle(cycle));
        }
        let node = self.node(id)?;
        stack.push(id);
        for dep in &node.deps {
            self.visit(*dep, stack, done, order)?;
        }
        stack.pop();
        done.insert(id);
        order.push(id);
        Ok(())
    }
}
