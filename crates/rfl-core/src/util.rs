//! Environment file loading for RFL binaries

use std::path::{Path, PathBuf};

/// Candidate locations for `rfl.env`, in search order:
/// 1. ./rfl.env
/// 2. User's config directory/rfl/rfl.env
/// 3. ~/.config/rfl/rfl.env
pub fn env_file_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from("rfl.env")];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("rfl").join("rfl.env"));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".config").join("rfl").join("rfl.env"));
    }
    candidates
}

/// Load the first `rfl.env` found. Variables that are already set win.
///
/// Returns the path that was read, if any.
pub fn load_env_file() -> Option<PathBuf> {
    let path = env_file_candidates().into_iter().find(|p| p.exists())?;
    load_env_file_from(&path).then_some(path)
}

/// Load a specific env file; returns `false` when it cannot be read.
pub fn load_env_file_from(path: &Path) -> bool {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let applied = parse_env_file(&contents);
            tracing::debug!("Applied {} variable(s) from {:?}", applied, path);
            true
        }
        Err(e) => {
            tracing::debug!("Could not read env file {:?}: {}", path, e);
            false
        }
    }
}

/// Parse env file contents and set environment variables (only if not already set).
/// Supports formats:
/// - `KEY=value`
/// - `export KEY=value`
/// - `KEY="quoted value"`
/// - `KEY='single quoted'`
/// - Comments starting with #
///
/// Returns the number of variables that were set.
pub fn parse_env_file(contents: &str) -> usize {
    let mut applied = 0;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !key.is_empty() && std::env::var(key).is_err() {
                std::env::set_var(key, value);
                applied += 1;
            }
        }
    }
    applied
}
