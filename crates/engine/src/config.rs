// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration

use crate::ports::PortRange;
use crate::supervisor::{SupervisorConfig, DEFAULT_INBOX_CAPACITY};
use berth_core::ContainerSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid port range {min}-{max}")]
    PortRange { min: u16, max: u16 },
    #[error("runtime {runtime:?} is not in allowed_runtimes {allowed:?}")]
    RuntimeNotAllowed { runtime: String, allowed: Vec<String> },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the per-workload trees. Relative paths are resolved by the
    /// daemon against its state directory.
    pub storage_root: PathBuf,
    pub ports: PortRange,
    pub container: ContainerSettings,
    pub stop_grace_secs: u64,
    pub status_timeout_ms: u64,
    pub health_interval_ms: u64,
    pub proxy_timeout_secs: u64,
    pub inbox_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("workloads"),
            ports: PortRange::default(),
            container: ContainerSettings::default(),
            stop_grace_secs: 10,
            status_timeout_ms: 5000,
            health_interval_ms: 1000,
            proxy_timeout_secs: 30,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }

    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig { inbox_capacity: self.inbox_capacity }
    }

    /// Reject settings that would fail every workload.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ports.min == 0 || self.ports.min > self.ports.max {
            return Err(ConfigError::PortRange { min: self.ports.min, max: self.ports.max });
        }
        let container = &self.container;
        if !container.allowed_runtimes.contains(&container.runtime) {
            return Err(ConfigError::RuntimeNotAllowed {
                runtime: container.runtime.clone(),
                allowed: container.allowed_runtimes.clone(),
            });
        }
        for (name, value) in [
            ("health_interval_ms", self.health_interval_ms),
            ("status_timeout_ms", self.status_timeout_ms),
            ("proxy_timeout_secs", self.proxy_timeout_secs),
            ("inbox_capacity", self.inbox_capacity as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero(name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
