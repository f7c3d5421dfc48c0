// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory runtime for tests

use super::{BuildRequest, ContainerRuntime, ContainerStatus, RuntimeError};
use async_trait::async_trait;
use berth_core::{ContainerId, ContainerSpec, ImageId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Recorded runtime call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Build { tag: String },
    Start { spec: Box<ContainerSpec> },
    Stop { container_id: ContainerId, grace: Duration },
    Status { container_id: ContainerId },
    InspectIp { container_id: ContainerId },
    Logs { container_id: ContainerId, lines: usize },
}

#[derive(Default)]
struct FakeRuntimeState {
    calls: Vec<RuntimeCall>,
    images_built: u32,
    containers_started: u32,
    containers: HashMap<ContainerId, ContainerStatus>,
    logs: HashMap<ContainerId, String>,
    build_error: Option<String>,
    start_error: Option<String>,
    stop_error: Option<String>,
    status_error: Option<RuntimeError>,
}

/// Fake container runtime.
///
/// Images are `sha256:img<n>` and containers `c<n>`, numbered from 1 in
/// call order. Started containers report running until stopped or
/// [`exit_container`](Self::exit_container) is called.
#[derive(Clone)]
pub struct FakeRuntime {
    inner: Arc<Mutex<FakeRuntimeState>>,
    builds_paused: Arc<watch::Sender<bool>>,
    starts_paused: Arc<watch::Sender<bool>>,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeRuntimeState::default())),
            builds_paused: Arc::new(watch::Sender::new(false)),
            starts_paused: Arc::new(watch::Sender::new(false)),
        }
    }
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.inner.lock().calls.clone()
    }

    /// Specs passed to `start`, in order.
    pub fn started_specs(&self) -> Vec<ContainerSpec> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RuntimeCall::Start { spec } => Some((**spec).clone()),
                _ => None,
            })
            .collect()
    }

    /// Container ids passed to `stop`, in order.
    pub fn stopped(&self) -> Vec<ContainerId> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RuntimeCall::Stop { container_id, .. } => Some(container_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of containers currently present.
    pub fn container_count(&self) -> usize {
        self.inner.lock().containers.len()
    }

    pub fn fail_builds(&self, reason: impl Into<String>) {
        self.inner.lock().build_error = Some(reason.into());
    }

    pub fn fail_starts(&self, reason: impl Into<String>) {
        self.inner.lock().start_error = Some(reason.into());
    }

    pub fn fail_stops(&self, reason: impl Into<String>) {
        self.inner.lock().stop_error = Some(reason.into());
    }

    pub fn fail_status(&self, error: RuntimeError) {
        self.inner.lock().status_error = Some(error);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock();
        inner.build_error = None;
        inner.start_error = None;
        inner.stop_error = None;
        inner.status_error = None;
    }

    /// Hold every build until [`resume_builds`](Self::resume_builds) or cancellation.
    pub fn pause_builds(&self) {
        self.builds_paused.send_replace(true);
    }

    pub fn resume_builds(&self) {
        self.builds_paused.send_replace(false);
    }

    /// Hold every start until [`resume_starts`](Self::resume_starts) or
    /// cancellation. A cancelled start leaves no container behind.
    pub fn pause_starts(&self) {
        self.starts_paused.send_replace(true);
    }

    pub fn resume_starts(&self) {
        self.starts_paused.send_replace(false);
    }

    /// Mark a container as exited, as if its process died.
    pub fn exit_container(&self, container_id: &ContainerId, code: i32) {
        self.inner.lock().containers.insert(container_id.clone(), ContainerStatus::exited(code));
    }

    pub fn set_logs(&self, container_id: &ContainerId, logs: impl Into<String>) {
        self.inner.lock().logs.insert(container_id.clone(), logs.into());
    }

    fn record(&self, call: RuntimeCall) {
        self.inner.lock().calls.push(call);
    }
}

fn failed(command: &str, reason: &str) -> RuntimeError {
    RuntimeError::CommandFailed { command: command.to_string(), stderr: reason.to_string() }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn build(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> Result<ImageId, RuntimeError> {
        self.record(RuntimeCall::Build { tag: request.tag.clone() });

        let mut paused = self.builds_paused.subscribe();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
            _ = paused.wait_for(|p| !*p) => {}
        }

        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.build_error {
            return Err(failed("docker build", reason));
        }
        inner.images_built += 1;
        Ok(ImageId::new(format!("sha256:img{}", inner.images_built)))
    }

    async fn start(
        &self,
        spec: &ContainerSpec,
        cancel: &CancellationToken,
    ) -> Result<ContainerId, RuntimeError> {
        self.record(RuntimeCall::Start { spec: Box::new(spec.clone()) });

        let mut paused = self.starts_paused.subscribe();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
            _ = paused.wait_for(|p| !*p) => {}
        }

        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.start_error {
            return Err(failed("docker run", reason));
        }
        inner.containers_started += 1;
        let id = ContainerId::new(format!("c{}", inner.containers_started));
        inner.containers.insert(id.clone(), ContainerStatus::running());
        Ok(id)
    }

    async fn stop(
        &self,
        container_id: &ContainerId,
        grace: Duration,
        _cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Stop { container_id: container_id.clone(), grace });

        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.stop_error {
            return Err(failed("docker rm", reason));
        }
        inner.containers.remove(container_id);
        Ok(())
    }

    async fn status(&self, container_id: &ContainerId) -> Result<ContainerStatus, RuntimeError> {
        self.record(RuntimeCall::Status { container_id: container_id.clone() });

        let inner = self.inner.lock();
        if let Some(error) = &inner.status_error {
            return Err(error.clone());
        }
        inner
            .containers
            .get(container_id)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(container_id.to_string()))
    }

    async fn inspect_ip(&self, container_id: &ContainerId) -> Result<IpAddr, RuntimeError> {
        self.record(RuntimeCall::InspectIp { container_id: container_id.clone() });

        let inner = self.inner.lock();
        if !inner.containers.contains_key(container_id) {
            return Err(RuntimeError::NotFound(container_id.to_string()));
        }
        let n: u8 = container_id.trim_start_matches('c').parse().unwrap_or(0);
        Ok(IpAddr::V4(Ipv4Addr::new(172, 17, 0, n.saturating_add(1))))
    }

    async fn logs_tail(&self, container_id: &ContainerId, lines: usize) -> Result<String, RuntimeError> {
        self.record(RuntimeCall::Logs { container_id: container_id.clone(), lines });

        let inner = self.inner.lock();
        if !inner.containers.contains_key(container_id) {
            return Err(RuntimeError::NotFound(container_id.to_string()));
        }
        let logs = inner.logs.get(container_id).cloned().unwrap_or_default();
        let all: Vec<&str> = logs.lines().collect();
        Ok(all[all.len().saturating_sub(lines)..].join("\n"))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
