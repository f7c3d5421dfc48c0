// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration file.
//!
//! A TOML file with daemon keys at the top level and the engine keys
//! flattened alongside them:
//!
//! ```toml
//! docker = "/usr/bin/docker"
//! stop_grace_secs = 5
//!
//! [ports]
//! min = 20000
//! max = 20999
//!
//! [container]
//! runtime = "runsc"
//! ```
//!
//! Environment variables override file values.

use std::path::{Path, PathBuf};

use berth_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::env;
use crate::lifecycle::LifecycleError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Falls back to [`env::state_dir`] when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    /// Container engine CLI.
    pub docker: String,
    #[serde(flatten)]
    pub engine: EngineConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { state_dir: None, docker: "docker".to_string(), engine: EngineConfig::default() }
    }
}

impl DaemonConfig {
    /// Read `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, LifecycleError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw).map_err(|e| LifecycleError::Config(format!("{}: {e}", path.display())))
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Overlay `BERTH_*` variables.
    pub fn apply_env(&mut self) -> Result<(), LifecycleError> {
        if let Some(dir) = env::non_empty(env::STATE_DIR) {
            self.state_dir = Some(PathBuf::from(dir));
        }
        if let Some(docker) = env::non_empty(env::DOCKER) {
            self.docker = docker;
        }
        if let Some(runtime) = env::non_empty(env::RUNTIME) {
            self.engine.container.runtime = runtime;
        }
        if let Some(min) = env::parsed::<u16>(env::PORT_MIN)? {
            self.engine.ports.min = min;
        }
        if let Some(max) = env::parsed::<u16>(env::PORT_MAX)? {
            self.engine.ports.max = max;
        }
        if let Some(ms) = env::parsed::<u64>(env::HEALTH_INTERVAL_MS)? {
            self.engine.health_interval_ms = ms;
        }
        Ok(())
    }

    /// Fix the state directory and make `storage_root` absolute.
    pub fn resolve(&mut self) -> Result<(), LifecycleError> {
        let state_dir = match &self.state_dir {
            Some(dir) => dir.clone(),
            None => env::state_dir()?,
        };
        if self.engine.storage_root.is_relative() {
            self.engine.storage_root = state_dir.join(&self.engine.storage_root);
        }
        self.state_dir = Some(state_dir);
        Ok(())
    }

    /// Effective configuration, as printed by `berthd --check`.
    pub fn to_toml(&self) -> Result<String, LifecycleError> {
        toml::to_string_pretty(self).map_err(|e| LifecycleError::Config(e.to_string()))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
