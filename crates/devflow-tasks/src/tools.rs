//! Test, lint and format steps: the tool invocations run inside the
//! environment and the mapping of their exit codes onto [`TaskError`].

use devflow_core::TaskError;
use devflow_env::{CommandRunner, Environment, ExecutionResult, Invocation};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// pytest: all tests passed
const PYTEST_OK: i32 = 0;
/// pytest: some tests failed
const PYTEST_TESTS_FAILED: i32 = 1;
/// pytest: nothing collected
const PYTEST_NO_TESTS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed,
    Error,
    Skipped,
    XFail,
    XPass,
}

impl TestOutcome {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "PASSED" => Self::Passed,
            "FAILED" => Self::Failed,
            "ERROR" => Self::Error,
            "SKIPPED" => Self::Skipped,
            "XFAIL" => Self::XFail,
            "XPASS" => Self::XPass,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub outcome: TestOutcome,
    pub node_id: String,
}

/// What one pytest run reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestReport {
    pub cases: Vec<TestCase>,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub xfailed: usize,
    pub xpassed: usize,
    /// Line coverage of the scoped package; 0 when no TOTAL row was printed
    pub coverage_percent: f64,
    pub exit_code: i32,
}

impl TestReport {
    pub fn collected(&self) -> usize {
        self.passed + self.failed + self.errors + self.skipped + self.xfailed + self.xpassed
    }
}

impl fmt::Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} collected: {} passed, {} failed, {} errors, {} skipped; coverage {:.0}%",
            self.collected(),
            self.passed,
            self.failed,
            self.errors,
            self.skipped,
            self.coverage_percent
        )
    }
}

static SUMMARY_RE: OnceLock<Regex> = OnceLock::new();
static COUNT_RE: OnceLock<Regex> = OnceLock::new();
static CASE_RE: OnceLock<Regex> = OnceLock::new();
static TOTAL_RE: OnceLock<Regex> = OnceLock::new();

/// Parse pytest's `-rA` short summary, final summary line and the
/// pytest-cov `TOTAL` row. The final line is `=`-padded except under `-q`.
pub fn parse_pytest_output(output: &str, exit_code: i32) -> TestReport {
    let summary_re = SUMMARY_RE.get_or_init(|| {
        Regex::new(r"^(?:=+ )?((?:\d+ \w+|no tests ran).*?) in [\d.]+s(?: \([^)]*\))?(?: =+)?$")
            .expect("summary regex")
    });
    let count_re = COUNT_RE.get_or_init(|| {
        Regex::new(r"(\d+) (passed|failed|errors?|skipped|xfailed|xpassed)\b")
            .expect("count regex")
    });
    // Skips are reported by location: `SKIPPED [1] tests/x.py:40: reason`.
    let case_re = CASE_RE.get_or_init(|| {
        Regex::new(r"^(PASSED|FAILED|ERROR|SKIPPED|XFAIL|XPASS) (?:\[\d+\] )?(\S+?):?(?:\s|$)")
            .expect("case regex")
    });
    let total_re = TOTAL_RE.get_or_init(|| {
        Regex::new(r"^TOTAL\s.*?(\d+(?:\.\d+)?)%\s*$").expect("total regex")
    });

    let mut report = TestReport {
        exit_code,
        ..TestReport::default()
    };

    let mut summary: Option<&str> = None;
    for line in output.lines() {
        let line = line.trim_end();
        if let Some(c) = case_re.captures(line) {
            if let Some(outcome) = TestOutcome::parse(&c[1]) {
                report.cases.push(TestCase {
                    outcome,
                    node_id: c[2].to_string(),
                });
            }
        } else if let Some(c) = total_re.captures(line) {
            report.coverage_percent = c[1].parse().unwrap_or(0.0);
        } else if let Some(c) = summary_re.captures(line) {
            summary = c.get(1).map(|m| m.as_str());
        }
    }

    if let Some(summary) = summary {
        for c in count_re.captures_iter(summary) {
            let n: usize = c[1].parse().unwrap_or(0);
            match &c[2] {
                "passed" => report.passed = n,
                "failed" => report.failed = n,
                "error" | "errors" => report.errors = n,
                "skipped" => report.skipped = n,
                "xfailed" => report.xfailed = n,
                "xpassed" => report.xpassed = n,
                _ => {}
            }
        }
    }
    report
}

fn missing_module(out: &ExecutionResult) -> bool {
    out.stderr.contains("No module named")
}

fn require_environment(env: &Environment) -> Result<(), TaskError> {
    if env.is_provisioned() {
        Ok(())
    } else {
        Err(TaskError::environment(format!(
            "no environment at {}",
            env.root().display()
        )))
    }
}

fn spawn_error(invocation: &Invocation, e: std::io::Error) -> TaskError {
    TaskError::environment(format!("failed to run {}: {}", invocation.display(), e))
}

/// Build the pytest invocation: coverage scoped to `package`, all outcomes in
/// the short summary, the test directory when it exists, then `forwarded`.
pub fn pytest_invocation(
    env: &Environment,
    project_dir: &Path,
    package: &str,
    test_dir: Option<&str>,
    forwarded: &[String],
) -> Invocation {
    let mut inv = env
        .invocation(project_dir)
        .args(["-m", "pytest"])
        .arg(format!("--cov={}", package))
        .args(["--cov-report=term", "-rA"]);
    if let Some(dir) = test_dir {
        inv = inv.arg(dir);
    }
    inv.args(forwarded)
}

pub fn run_tests(
    runner: &dyn CommandRunner,
    env: &Environment,
    project_dir: &Path,
    package: &str,
    test_dir: Option<&str>,
    forwarded: &[String],
) -> Result<TestReport, TaskError> {
    require_environment(env)?;
    let invocation = pytest_invocation(env, project_dir, package, test_dir, forwarded);
    let out = runner
        .run(&invocation)
        .map_err(|e| spawn_error(&invocation, e))?;
    let report = parse_pytest_output(&out.combined(), out.exit_code);

    match out.exit_code {
        PYTEST_OK | PYTEST_NO_TESTS => Ok(report),
        PYTEST_TESTS_FAILED if !missing_module(&out) => Err(TaskError::TestFailure {
            failed: (report.failed + report.errors).max(1),
            exit_code: out.exit_code,
        }),
        code => Err(TaskError::Environment {
            message: format!("pytest exited with code {}: {}", code, out.stderr.trim()),
            exit_code: Some(code),
        }),
    }
}

pub fn run_lint(
    runner: &dyn CommandRunner,
    env: &Environment,
    project_dir: &Path,
    forwarded: &[String],
) -> Result<(), TaskError> {
    require_environment(env)?;
    let invocation = env
        .invocation(project_dir)
        .args(["-m", "ruff", "check", "--fix", "."])
        .args(forwarded);
    let out = runner
        .run(&invocation)
        .map_err(|e| spawn_error(&invocation, e))?;
    if out.success() {
        Ok(())
    } else if missing_module(&out) {
        Err(TaskError::Environment {
            message: out.stderr.trim().to_string(),
            exit_code: Some(out.exit_code),
        })
    } else {
        Err(TaskError::Lint {
            exit_code: out.exit_code,
        })
    }
}

pub fn run_format(
    runner: &dyn CommandRunner,
    env: &Environment,
    project_dir: &Path,
    forwarded: &[String],
) -> Result<(), TaskError> {
    require_environment(env)?;
    let invocation = env
        .invocation(project_dir)
        .args(["-m", "ruff", "format", "."])
        .args(forwarded);
    let out = runner
        .run(&invocation)
        .map_err(|e| spawn_error(&invocation, e))?;
    if out.success() {
        Ok(())
    } else if missing_module(&out) {
        Err(TaskError::Environment {
            message: out.stderr.trim().to_string(),
            exit_code: Some(out.exit_code),
        })
    } else {
        Err(TaskError::Format {
            exit_code: out.exit_code,
        })
    }
}
