//! Runs a target and its prerequisites.
//!
//! The requested target always runs. A prerequisite runs only when it is
//! stale, and at most once per invocation. Completion markers go to stderr
//! so they interleave with tool diagnostics in order.

use devflow_core::observability;
use devflow_core::TaskError;
use std::collections::HashMap;
use std::time::Instant;

use crate::graph::{DepPolicy, TaskGraph, TaskId};

/// What the scheduler drives: freshness predicates and task bodies.
pub trait TaskAction {
    /// True when the task's effect is already in place and it may be skipped
    /// as a prerequisite.
    fn is_fresh(&self, task: TaskId) -> bool;

    fn execute(&mut self, task: TaskId) -> Result<(), TaskError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Tasks whose body ran successfully, in order
    pub executed: Vec<TaskId>,
    /// Prerequisites skipped because they were fresh
    pub up_to_date: Vec<TaskId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Done,
    Failed,
}

pub struct Scheduler<'g> {
    graph: &'g TaskGraph,
}

impl<'g> Scheduler<'g> {
    pub fn new(graph: &'g TaskGraph) -> Self {
        Self { graph }
    }

    pub fn run(&self, target: TaskId, action: &mut dyn TaskAction) -> Result<RunReport, TaskError> {
        // Validates the closure (unknown nodes, cycles) before anything runs.
        let plan = self.graph.plan(target)?;
        tracing::debug!(target = %target, plan = ?plan, "Planned");

        let mut run = Run {
            graph: self.graph,
            target,
            action,
            states: HashMap::new(),
            errors: Vec::new(),
            report: RunReport::default(),
        };
        run.visit(target)?;

        if run.errors.is_empty() {
            return Ok(run.report);
        }
        let target_node = self.graph.node(target)?;
        let all_direct = run
            .errors
            .iter()
            .all(|(id, _)| target_node.deps.contains(id));
        let mut errors: Vec<TaskError> = run.errors.into_iter().map(|(_, e)| e).collect();
        if target_node.policy == DepPolicy::RunAll && all_direct {
            Err(TaskError::CheckFailed(errors))
        } else {
            Err(errors.remove(0))
        }
    }
}

struct Run<'a> {
    graph: &'a TaskGraph,
    target: TaskId,
    action: &'a mut dyn TaskAction,
    states: HashMap<TaskId, NodeState>,
    /// Task bodies that failed, in the order they ran
    errors: Vec<(TaskId, TaskError)>,
    report: RunReport,
}

impl Run<'_> {
    /// `Ok(true)` = the task is satisfied, `Ok(false)` = it failed or was
    /// blocked. `Err` is reserved for graph errors.
    fn visit(&mut self, id: TaskId) -> Result<bool, TaskError> {
        if let Some(state) = self.states.get(&id) {
            return Ok(*state == NodeState::Done);
        }
        let node = self.graph.node(id)?.clone();

        let mut failed_dep = None;
        for dep in &node.deps {
            if !self.visit(*dep)? {
                failed_dep.get_or_insert(*dep);
                if node.policy == DepPolicy::FailFast {
                    break;
                }
            }
        }
        if let Some(dep) = failed_dep {
            tracing::warn!(task = %id, prerequisite = %dep, "Not run: prerequisite failed");
            self.states.insert(id, NodeState::Failed);
            return Ok(false);
        }

        if id != self.target && self.action.is_fresh(id) {
            eprintln!("• {} up to date", id);
            observability::audit_task_completed(id.name(), 0, true);
            self.report.up_to_date.push(id);
            self.states.insert(id, NodeState::Done);
            return Ok(true);
        }

        observability::audit_task_started(id.name());
        let started = Instant::now();
        let result = self.action.execute(id);
        let elapsed = started.elapsed().as_millis() as u64;
        match result {
            Ok(()) => {
                eprintln!("✓ {} completed", id);
                observability::audit_task_completed(id.name(), elapsed, false);
                self.report.executed.push(id);
                self.states.insert(id, NodeState::Done);
                Ok(true)
            }
            Err(e) => {
                observability::audit_task_failed(id.name(), e.kind(), e.exit_code(), elapsed);
                self.errors.push((id, e));
                self.states.insert(id, NodeState::Failed);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Records executions; fails the tasks listed in `fail`.
    #[derive(Default)]
    struct Recorder {
        fresh: HashSet<TaskId>,
        fail: HashMap<TaskId, i32>,
        executed: Vec<TaskId>,
    }

    impl TaskAction for Recorder {
        fn is_fresh(&self, task: TaskId) -> bool {
            self.fresh.contains(&task)
        }

        fn execute(&mut self, task: TaskId) -> Result<(), TaskError> {
            self.executed.push(task);
            match self.fail.get(&task) {
                Some(code) => Err(match task {
                    TaskId::Provision => TaskError::provisioning("no interpreter"),
                    TaskId::Lint => TaskError::Lint { exit_code: *code },
                    TaskId::Format => TaskError::Format { exit_code: *code },
                    _ => TaskError::environment("boom"),
                }),
                None => {
                    if task == TaskId::Provision {
                        self.fresh.insert(TaskId::Provision);
                    }
                    Ok(())
                }
            }
        }
    }

    #[test]
    fn test_full_chain_from_scratch() {
        let g = TaskGraph::standard();
        let mut rec = Recorder::default();
        let report = Scheduler::new(&g).run(TaskId::Test, &mut rec).unwrap();
        assert_eq!(rec.executed, vec![TaskId::Provision, TaskId::Install, TaskId::Test]);
        assert_eq!(report.executed, rec.executed);
        assert!(report.up_to_date.is_empty());
    }

    #[test]
    fn test_fresh_prerequisites_are_skipped() {
        let g = TaskGraph::standard();
        let mut rec = Recorder {
            fresh: HashSet::from([TaskId::Provision, TaskId::Install]),
            ..Default::default()
        };
        let report = Scheduler::new(&g).run(TaskId::Lint, &mut rec).unwrap();
        assert_eq!(rec.executed, vec![TaskId::Lint]);
        assert_eq!(report.up_to_date, vec![TaskId::Provision, TaskId::Install]);
    }

    #[test]
    fn test_requested_target_runs_even_when_fresh() {
        let g = TaskGraph::standard();
        let mut rec = Recorder {
            fresh: HashSet::from([TaskId::Provision]),
            ..Default::default()
        };
        Scheduler::new(&g).run(TaskId::Provision, &mut rec).unwrap();
        assert_eq!(rec.executed, vec![TaskId::Provision]);
    }

    #[test]
    fn test_failed_prerequisite_stops_chain() {
        let g = TaskGraph::standard();
        let mut rec = Recorder {
            fail: HashMap::from([(TaskId::Provision, 1)]),
            ..Default::default()
        };
        let err = Scheduler::new(&g).run(TaskId::Test, &mut rec).unwrap_err();
        assert!(matches!(err, TaskError::Provisioning { .. }));
        assert_eq!(rec.executed, vec![TaskId::Provision]);
    }

    #[test]
    fn test_check_runs_format_after_lint_failure() {
        let g = TaskGraph::standard();
        let mut rec = Recorder {
            fresh: HashSet::from([TaskId::Provision, TaskId::Install]),
            fail: HashMap::from([(TaskId::Lint, 1)]),
            ..Default::default()
        };
        let err = Scheduler::new(&g).run(TaskId::Check, &mut rec).unwrap_err();
        // Formatter still ran; the composite body did not.
        assert_eq!(rec.executed, vec![TaskId::Lint, TaskId::Format]);
        match err {
            TaskError::CheckFailed(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(matches!(errors[0], TaskError::Lint { exit_code: 1 }));
            }
            other => panic!("expected CheckFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_check_aggregates_both_failures() {
        let g = TaskGraph::standard();
        let mut rec = Recorder {
            fresh: HashSet::from([TaskId::Provision, TaskId::Install]),
            fail: HashMap::from([(TaskId::Lint, 1), (TaskId::Format, 2)]),
            ..Default::default()
        };
        let err = Scheduler::new(&g).run(TaskId::Check, &mut rec).unwrap_err();
        assert_eq!(err.exit_code(), 1);
        assert!(matches!(err, TaskError::CheckFailed(ref e) if e.len() == 2));
    }

    #[test]
    fn test_check_with_broken_install_reports_install_error() {
        let g = TaskGraph::standard();
        let mut rec = Recorder {
            fresh: HashSet::from([TaskId::Provision]),
            fail: HashMap::from([(TaskId::Install, 1)]),
            ..Default::default()
        };
        let err = Scheduler::new(&g).run(TaskId::Check, &mut rec).unwrap_err();
        // Install ran once; lint and format never started.
        assert_eq!(rec.executed, vec![TaskId::Install]);
        assert!(matches!(err, TaskError::Environment { .. }));
    }

    #[test]
    fn test_each_node_runs_once() {
        let g = TaskGraph::standard();
        let mut rec = Recorder::default();
        Scheduler::new(&g).run(TaskId::Check, &mut rec).unwrap();
        let installs = rec.executed.iter().filter(|t| **t == TaskId::Install).count();
        assert_eq!(installs, 1);
        assert_eq!(rec.executed.last(), Some(&TaskId::Check));
    }
}
