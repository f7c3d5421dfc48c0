// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::str::FromStr;

use crate::lifecycle::LifecycleError;

pub const STATE_DIR: &str = "BERTH_STATE_DIR";
pub const CONFIG: &str = "BERTH_CONFIG";
pub const PORT_MIN: &str = "BERTH_PORT_MIN";
pub const PORT_MAX: &str = "BERTH_PORT_MAX";
pub const RUNTIME: &str = "BERTH_RUNTIME";
pub const HEALTH_INTERVAL_MS: &str = "BERTH_HEALTH_INTERVAL_MS";
pub const DOCKER: &str = "BERTH_DOCKER";

/// Resolve state directory: BERTH_STATE_DIR > XDG_STATE_HOME/berth > ~/.local/state/berth
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Some(dir) = non_empty(STATE_DIR) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("berth"));
    }
    let home = non_empty("HOME").ok_or(LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/berth"))
}

/// Config file named by BERTH_CONFIG, if any.
pub fn config_path() -> Option<PathBuf> {
    non_empty(CONFIG).map(PathBuf::from)
}

pub fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Parse a variable if set. A set but unparseable value is an error.
pub fn parsed<T: FromStr>(name: &'static str) -> Result<Option<T>, LifecycleError> {
    match non_empty(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| LifecycleError::InvalidEnv { name, value: raw }),
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
