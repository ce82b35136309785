//! Command registry: each dispatch module registers the handlers for the
//! `Commands` variants it owns, so adding a command never touches `lib.rs`.

use anyhow::Result;
use devflow_core::config::WorkflowConfig;
use devflow_env::{CommandRunner, InterpreterResolver};
use std::sync::Arc;

use crate::cli::Commands;

/// What every handler gets besides the parsed command.
pub struct Context<'a> {
    pub config: WorkflowConfig,
    pub runner: &'a dyn CommandRunner,
    pub resolver: &'a dyn InterpreterResolver,
}

/// Returns `Some(result)` when it handles `cmd`, `None` otherwise.
pub type CommandHandler = Arc<dyn Fn(&Commands, &Context<'_>) -> Option<Result<()>> + Send + Sync>;

/// Handlers are tried in registration order; the first `Some` wins.
pub struct CommandRegistry {
    handlers: Vec<CommandHandler>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register<F>(&mut self, f: F)
    where
        F: Fn(&Commands, &Context<'_>) -> Option<Result<()>> + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(f));
    }

    pub fn dispatch(&self, cmd: &Commands, ctx: &Context<'_>) -> Result<()> {
        for h in &self.handlers {
            if let Some(r) = h(cmd, ctx) {
                return r;
            }
        }
        anyhow::bail!("no handler registered for {:?}", cmd)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
