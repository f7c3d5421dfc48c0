// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::config::ConfigError;
use crate::ports::PortError;
use crate::registry::RegistryError;
use crate::supervisor::SupervisorError;
use berth_adapters::{RuntimeError, StorageError};
use berth_core::{Lifecycle, WorkloadId};
use thiserror::Error;

/// Errors surfaced by [`Host`](crate::Host) operations.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("workload {0} not found")]
    NotFound(WorkloadId),
    #[error("workload {0} already exists")]
    AlreadyExists(WorkloadId),
    #[error("workload {id} is already running ({lifecycle})")]
    AlreadyRunning { id: WorkloadId, lifecycle: Lifecycle },
    #[error("workload {id} is not running ({lifecycle})")]
    NotRunning { id: WorkloadId, lifecycle: Lifecycle },
    #[error("workload {id} cannot restart from {lifecycle}")]
    NotRestartable { id: WorkloadId, lifecycle: Lifecycle },
    #[error("workload {id} has no container ({lifecycle})")]
    NoContainer { id: WorkloadId, lifecycle: Lifecycle },
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("no capacity: {0}")]
    Exhausted(PortError),
    #[error(transparent)]
    Supervisor(SupervisorError),
    #[error("container engine: {0}")]
    Engine(#[from] RuntimeError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl HostError {
    /// HTTP status for a lifecycle RPC front end.
    pub fn status_code(&self) -> u16 {
        match self {
            HostError::NotFound(_) => 404,
            HostError::AlreadyExists(_)
            | HostError::AlreadyRunning { .. }
            | HostError::NotRunning { .. }
            | HostError::NotRestartable { .. }
            | HostError::NoContainer { .. } => 409,
            HostError::Validation(_) => 400,
            HostError::Exhausted(_) => 503,
            HostError::Supervisor(SupervisorError::Stopped(_)) => 404,
            HostError::Supervisor(SupervisorError::InboxFull(_)) => 503,
            HostError::Engine(RuntimeError::NotFound(_)) => 404,
            HostError::Engine(_) | HostError::Storage(_) | HostError::Config(_) => 500,
        }
    }
}

impl From<RegistryError> for HostError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::AlreadyExists(id) => HostError::AlreadyExists(id),
            RegistryError::NotFound(id) => HostError::NotFound(id),
            RegistryError::Ports(e @ PortError::Exhausted { .. }) => HostError::Exhausted(e),
            RegistryError::Ports(e) => HostError::Config(e.to_string()),
        }
    }
}

impl From<SupervisorError> for HostError {
    fn from(e: SupervisorError) -> Self {
        match e {
            SupervisorError::Stopped(id) => HostError::NotFound(id),
            e @ SupervisorError::InboxFull(_) => HostError::Supervisor(e),
        }
    }
}

impl From<ConfigError> for HostError {
    fn from(e: ConfigError) -> Self {
        HostError::Config(e.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
