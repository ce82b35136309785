//! Scripted stand-ins for the OS seams, shared by this workspace's tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use crate::runner::{CommandRunner, ExecutionResult, Invocation};
use crate::runtime_resolver::InterpreterResolver;

/// Resolver backed by fixed maps.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    interpreters: HashMap<String, PathBuf>,
    tools: HashMap<String, PathBuf>,
}

impl Default for StaticResolver {
    /// Knows `python3` only.
    fn default() -> Self {
        Self {
            interpreters: HashMap::from([(
                "python3".to_string(),
                PathBuf::from("/usr/bin/python3"),
            )]),
            tools: HashMap::new(),
        }
    }
}

impl StaticResolver {
    pub fn empty() -> Self {
        Self {
            interpreters: HashMap::new(),
            tools: HashMap::new(),
        }
    }

    pub fn with_interpreter(mut self, id: &str, path: &str) -> Self {
        self.interpreters.insert(id.to_string(), PathBuf::from(path));
        self
    }

    pub fn with_tool(mut self, name: &str, path: &str) -> Self {
        self.tools.insert(name.to_string(), PathBuf::from(path));
        self
    }
}

impl InterpreterResolver for StaticResolver {
    fn resolve_interpreter(&self, identifier: &str) -> Option<PathBuf> {
        self.interpreters.get(identifier).cloned()
    }

    fn find_tool(&self, name: &str) -> Option<PathBuf> {
        self.tools.get(name).cloned()
    }
}

type Responder = Box<dyn Fn(&Invocation) -> Option<io::Result<ExecutionResult>>>;

/// Records every invocation. Responders are tried in registration order; the
/// first `Some` wins. Unmatched invocations fall through to
/// [`simulate_tooling`].
pub struct ScriptedRunner {
    calls: RefCell<Vec<Invocation>>,
    responders: Vec<Responder>,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            responders: Vec::new(),
        }
    }

    /// Answer invocations whose rendered command line contains `needle`.
    pub fn respond(mut self, needle: &str, result: ExecutionResult) -> Self {
        let needle = needle.to_string();
        self.responders.push(Box::new(move |inv| {
            inv.display()
                .contains(&needle)
                .then(|| Ok(result.clone()))
        }));
        self
    }

    /// Fail to spawn invocations whose command line contains `needle`.
    pub fn fail_spawn(mut self, needle: &str) -> Self {
        let needle = needle.to_string();
        self.responders.push(Box::new(move |inv| {
            inv.display().contains(&needle).then(|| {
                Err(io::Error::new(io::ErrorKind::NotFound, "No such file or directory"))
            })
        }));
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Number of recorded invocations whose command line contains `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.display().contains(needle))
            .count()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> io::Result<ExecutionResult> {
        self.calls.borrow_mut().push(invocation.clone());
        for r in &self.responders {
            if let Some(res) = r(invocation) {
                return res;
            }
        }
        simulate_tooling(invocation)
    }
}

pub fn ok(stdout: &str) -> ExecutionResult {
    ExecutionResult {
        stdout: stdout.to_string(),
        stderr: String::new(),
        exit_code: 0,
    }
}

pub fn exit(code: i32, stdout: &str, stderr: &str) -> ExecutionResult {
    ExecutionResult {
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        exit_code: code,
    }
}

/// Default behavior: environment creation (`-m venv <dir>` / `uv venv ... <dir>`)
/// writes a `pyvenv.cfg` into the last argument; everything else succeeds
/// silently.
pub fn simulate_tooling(invocation: &Invocation) -> io::Result<ExecutionResult> {
    let creates_env = invocation.args.iter().any(|a| a == "venv")
        && !invocation.args.iter().any(|a| a == "pip");
    if creates_env {
        if let Some(target) = invocation.args.last() {
            let root = PathBuf::from(target);
            std::fs::create_dir_all(root.join("bin"))?;
            std::fs::write(root.join("pyvenv.cfg"), "home = /usr/bin\nversion = 3.11.4\n")?;
        }
    }
    Ok(ok(""))
}
