// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container engine adapter.
//!
//! [`ContainerRuntime`] is the only path by which the engine touches the
//! container engine. [`DockerCli`] drives the `docker` binary;
//! `FakeRuntime` (feature `test-support`) records calls in memory.

mod docker;

pub use docker::DockerCli;

use async_trait::async_trait;
use berth_core::{ContainerId, ContainerSpec, ImageId, WorkloadId};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from container engine operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("failed to exec container engine: {0}")]
    Exec(String),
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("no such object: {0}")]
    NotFound(String),
    #[error("cancelled")]
    Cancelled,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected engine output: {0}")]
    Parse(String),
}

/// Inputs for an image build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub workload_id: WorkloadId,
    /// Build context; contains the Dockerfile and sources.
    pub context_dir: PathBuf,
    pub dockerfile: PathBuf,
    pub tag: String,
    /// File the engine writes the built image id to.
    pub iid_file: PathBuf,
    /// Combined build output lands here.
    pub log_file: PathBuf,
}

/// Engine-reported container state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Other(String),
}

impl ContainerState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            other => Self::Other(other.to_string()),
        }
    }
}

berth_core::simple_display! {
    ContainerState {
        Created => "created",
        Running => "running",
        Paused => "paused",
        Restarting => "restarting",
        Removing => "removing",
        Exited => "exited",
        Dead => "dead",
        Other(..) => "other",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub state: ContainerState,
    pub exit_code: Option<i32>,
}

impl ContainerStatus {
    pub fn running() -> Self {
        Self { state: ContainerState::Running, exit_code: None }
    }

    pub fn exited(code: i32) -> Self {
        Self { state: ContainerState::Exited, exit_code: Some(code) }
    }

    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }
}

/// Adapter for the external container engine
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Build an image and return its id.
    async fn build(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> Result<ImageId, RuntimeError>;

    /// Create and start a container from a validated spec.
    async fn start(
        &self,
        spec: &ContainerSpec,
        cancel: &CancellationToken,
    ) -> Result<ContainerId, RuntimeError>;

    /// Stop within `grace`, then remove. Removal still happens if `cancel`
    /// fires during the grace window.
    async fn stop(
        &self,
        container_id: &ContainerId,
        grace: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError>;

    async fn status(&self, container_id: &ContainerId) -> Result<ContainerStatus, RuntimeError>;

    async fn inspect_ip(&self, container_id: &ContainerId) -> Result<IpAddr, RuntimeError>;

    /// Last `lines` lines of container output, with timestamps.
    async fn logs_tail(&self, container_id: &ContainerId, lines: usize) -> Result<String, RuntimeError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRuntime, RuntimeCall};
