use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct ParsedArgs {
    pub values: HashMap<String, String>,
    pub flags: HashSet<String>,
}

/// Minimal `--key value` / `--key=value` / bare-flag parser.
pub fn parse_args(argv: &[String]) -> ParsedArgs {
    let mut result = ParsedArgs::default();
    let mut i = 0;
    while i < argv.len() {
        let token = &argv[i];
        let key = token.trim_start_matches('-');
        if !token.starts_with('-') || key.is_empty() {
            i += 1;
            continue;
        }
        if let Some((name, inline)) = key.split_once('=') {
            result.values.insert(name.to_string(), inline.to_string());
            i += 1;
        } else if let Some(next) = argv.get(i + 1).filter(|v| !v.starts_with('-')) {
            result.values.insert(key.to_string(), next.to_string());
            i += 2;
        } else {
            result.flags.insert(key.to_string());
            i += 1;
        }
    }
    result
}

pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(path)
}

pub fn get_home_dir() -> PathBuf {
    for var in ["HOME", "USERPROFILE"] {
        if let Ok(value) = env::var(var) {
            if !value.trim().is_empty() {
                return PathBuf::from(value);
            }
        }
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Where the default sqlite database lives. `TODO_STATE_ROOT` overrides the
/// home-relative default.
pub fn resolve_state_dir() -> PathBuf {
    if let Ok(root) = env::var("TODO_STATE_ROOT") {
        if !root.trim().is_empty() {
            return PathBuf::from(root.trim());
        }
    }
    get_home_dir().join(".todo-service")
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
