//! Observability: tracing init and the task audit log.
//!
//! Uses config::ObservabilityConfig for DEVFLOW_QUIET, DEVFLOW_LOG_LEVEL,
//! DEVFLOW_LOG_JSON and DEVFLOW_AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Initialize tracing on stderr. Call once at process startup.
/// `DEVFLOW_QUIET=1` limits output to WARN and above; `RUST_LOG` wins over
/// `DEVFLOW_LOG_LEVEL` when set.
pub fn init_tracing() {
    let cfg = crate::config::ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "devflow=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .try_init()
    };
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = crate::config::ObservabilityConfig::from_env()
        .audit_log
        .clone()?;
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

pub(crate) fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Audit: task_started
pub fn audit_task_started(task: &str) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "task_started",
            "task": task,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: task_completed (`fresh` = skipped because already up to date)
pub fn audit_task_completed(task: &str, duration_ms: u64, fresh: bool) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "task_completed",
            "task": task,
            "duration_ms": duration_ms,
            "fresh": fresh,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: task_failed
pub fn audit_task_failed(task: &str, error_kind: &str, exit_code: i32, duration_ms: u64) {
    tracing::warn!(task = %task, kind = %error_kind, exit_code, "Task failed");
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "task_failed",
            "task": task,
            "kind": error_kind,
            "exit_code": exit_code,
            "duration_ms": duration_ms,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: command_invoked (right before spawn)
pub fn audit_command_invoked(program: &str, args: &[String], cwd: &str) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": now(),
            "event": "command_invoked",
            "cmd": program,
            "args": args,
            "cwd": cwd,
        });
        append_jsonl(&path, &record);
    }
}
