//! Environment variable loading.
//!
//! Keeps the primary-key → alias fallback chain in one place so callers never
//! repeat `or_else` ladders.

use std::env;
use std::path::Path;

/// Load `<dir>/.env` into the process environment. Only the first call in a
/// process has an effect; variables that are already set are never overridden.
pub fn load_dotenv_from_dir(dir: &Path) {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let path = dir.join(".env");
        let Ok(content) = std::fs::read_to_string(&path) else {
            return;
        };
        let mut loaded = 0usize;
        for (key, value) in parse_dotenv(&content) {
            if env::var(&key).is_err() {
                set_env_var(&key, &value);
                loaded += 1;
            }
        }
        tracing::debug!(path = %path.display(), loaded, "Loaded .env");
    });
}

/// Parse `KEY=VALUE` lines. Blank lines and `#` comments are skipped, an
/// unquoted trailing `# comment` is stripped, and matching quotes are removed.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some(eq_pos) = line.find('=') else {
            continue;
        };
        let key = line[..eq_pos].trim();
        let mut value = line[eq_pos + 1..].trim();
        if let Some(hash_pos) = value.find('#') {
            let before_hash = value[..hash_pos].trim_end();
            if !before_hash.contains('"') && !before_hash.contains('\'') {
                value = before_hash;
            }
        }
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() {
            out.push((key.to_string(), value.to_string()));
        }
    }
    out
}

/// Read the primary key or the first set alias; fall back to `default`.
/// Empty values count as unset.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env_optional(primary, aliases).unwrap_or_else(default)
}

/// Read the primary key or the first set alias, trimmed. Empty values are `None`.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Boolean variable: 0/false/no/off are false, any other value is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

// All process-environment mutation goes through these two wrappers.
// Callers must invoke them before spawning threads.

#[allow(unsafe_code, unused_unsafe)]
pub fn set_env_var(key: &str, value: &str) {
    unsafe { env::set_var(key, value) };
}

#[allow(unsafe_code, unused_unsafe)]
pub fn remove_env_var(key: &str) {
    unsafe { env::remove_var(key) };
}

/// RAII guard: removes the variable through [`remove_env_var`] on drop.
pub struct ScopedEnvGuard(pub &'static str);

impl Drop for ScopedEnvGuard {
    fn drop(&mut self) {
        remove_env_var(self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv_quotes_and_comments() {
        let content = "\
# comment
DEVFLOW_PYTHON=3.11
export VENV=\".venv-dev\"
QUOTED='a # b'
TRAILING=value # note

=orphan
NO_EQUALS
";
        let parsed = parse_dotenv(content);
        assert_eq!(
            parsed,
            vec![
                ("DEVFLOW_PYTHON".to_string(), "3.11".to_string()),
                ("VENV".to_string(), ".venv-dev".to_string()),
                ("QUOTED".to_string(), "a # b".to_string()),
                ("TRAILING".to_string(), "value".to_string()),
            ]
        );
    }

    #[test]
    fn test_env_optional_alias_chain() {
        let _a = ScopedEnvGuard("DEVFLOW_TEST_LOADER_ALIAS");
        set_env_var("DEVFLOW_TEST_LOADER_ALIAS", "from-alias");
        assert_eq!(
            env_optional("DEVFLOW_TEST_LOADER_PRIMARY", &["DEVFLOW_TEST_LOADER_ALIAS"]),
            Some("from-alias".to_string())
        );
        assert_eq!(
            env_or("DEVFLOW_TEST_LOADER_MISSING", &[], || "fallback".to_string()),
            "fallback"
        );
    }

    #[test]
    fn test_env_optional_empty_is_unset() {
        let _g = ScopedEnvGuard("DEVFLOW_TEST_LOADER_EMPTY");
        set_env_var("DEVFLOW_TEST_LOADER_EMPTY", "   ");
        assert_eq!(env_optional("DEVFLOW_TEST_LOADER_EMPTY", &[]), None);
    }

    #[test]
    fn test_env_bool() {
        let _g = ScopedEnvGuard("DEVFLOW_TEST_LOADER_BOOL");
        assert!(env_bool("DEVFLOW_TEST_LOADER_BOOL", &[], true));
        set_env_var("DEVFLOW_TEST_LOADER_BOOL", "off");
        assert!(!env_bool("DEVFLOW_TEST_LOADER_BOOL", &[], true));
        set_env_var("DEVFLOW_TEST_LOADER_BOOL", "1");
        assert!(env_bool("DEVFLOW_TEST_LOADER_BOOL", &[], false));
    }
}
