// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle RPC, in process.
//!
//! `Host` checks each request against the workload's current lifecycle and
//! turns it into an event for the supervisor. It never changes state itself.

use crate::config::EngineConfig;
use crate::error::HostError;
use crate::executor::Executor;
use crate::monitor::HealthMonitor;
use crate::ports::PortAllocator;
use crate::proxy::{ProxyRequest, ProxyResponse, ProxyRouter, PROXY_PREFIX};
use crate::registry::{Registration, Registry};
use crate::supervisor::Supervisor;
use berth_adapters::storage::validate_source_path;
use berth_adapters::{ContainerRuntime, RuntimeError, StorageLayout};
use berth_core::{
    container_name, image_tag, BuildFingerprint, Clock, ContainerId, Event, ImageId, Lifecycle,
    SpecBuilder, SpecRequest, UserId, WorkloadId, WorkloadMetadata, WorkloadState,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Inputs to [`Host::create_workload`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateWorkload {
    pub user_id: String,
    pub dockerfile: String,
    /// Source files keyed by path relative to the build context.
    pub files: BTreeMap<String, String>,
}

/// Metadata and state of one workload, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadView {
    pub id: WorkloadId,
    pub user_id: UserId,
    pub fingerprint: BuildFingerprint,
    pub publish_port: u16,
    pub created_at_ms: u64,
    pub lifecycle: Lifecycle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<ImageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<ContainerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,
    pub last_updated_ms: u64,
    pub proxy_path: String,
}

impl WorkloadView {
    fn new(metadata: WorkloadMetadata, state: WorkloadState) -> Self {
        let proxy_path = format!("{PROXY_PREFIX}{}/proxy/", metadata.id);
        Self {
            id: metadata.id,
            user_id: metadata.user_id,
            fingerprint: metadata.fingerprint,
            publish_port: metadata.publish_port,
            created_at_ms: metadata.created_at_ms,
            lifecycle: state.lifecycle,
            image_id: state.image_id,
            container_id: state.container_id,
            error: state.error,
            last_failure: state.last_failure,
            last_updated_ms: state.last_updated_ms,
            proxy_path,
        }
    }
}

pub struct Host<R: ContainerRuntime, C: Clock> {
    registry: Arc<Registry<C>>,
    runtime: Arc<R>,
    storage: StorageLayout,
    specs: SpecBuilder,
    proxy: ProxyRouter<C>,
    stop_grace: Duration,
    health_interval: Duration,
}

impl<R: ContainerRuntime, C: Clock> Host<R, C> {
    pub fn new(config: &EngineConfig, runtime: R, clock: C) -> Result<Self, HostError> {
        let ports = PortAllocator::new(config.ports).map_err(|e| HostError::Config(e.to_string()))?;
        Self::with_ports(config, runtime, clock, ports)
    }

    /// Build a host around an existing allocator.
    pub fn with_ports(
        config: &EngineConfig,
        runtime: R,
        clock: C,
        ports: PortAllocator,
    ) -> Result<Self, HostError> {
        let specs = SpecBuilder::new(config.container.clone());
        Self::with_parts(config, runtime, clock, ports, specs)
    }

    /// Build a host with a preconfigured spec builder.
    pub fn with_parts(
        config: &EngineConfig,
        runtime: R,
        clock: C,
        ports: PortAllocator,
        specs: SpecBuilder,
    ) -> Result<Self, HostError> {
        config.validate()?;
        let runtime = Arc::new(runtime);
        let storage = StorageLayout::new(&config.storage_root);
        let executor = Executor::new(Arc::clone(&runtime), storage.clone(), specs.clone())
            .stop_grace(config.stop_grace())
            .status_timeout(config.status_timeout());
        let registry = Arc::new(Registry::new(ports, Arc::new(executor), clock, config.supervisor()));
        let proxy = ProxyRouter::new(Arc::clone(&registry), config.proxy_timeout())
            .map_err(|e| HostError::Config(format!("http client: {e}")))?;

        Ok(Self {
            registry,
            runtime,
            storage,
            specs,
            proxy,
            stop_grace: config.stop_grace(),
            health_interval: config.health_interval(),
        })
    }

    pub fn registry(&self) -> &Arc<Registry<C>> {
        &self.registry
    }

    pub fn storage(&self) -> &StorageLayout {
        &self.storage
    }

    fn lookup(&self, id: &WorkloadId) -> Result<(WorkloadMetadata, Arc<Supervisor>), HostError> {
        let not_found = || HostError::NotFound(id.clone());
        let metadata = self.registry.get(id).ok_or_else(not_found)?;
        let supervisor = self.registry.get_supervisor(id).ok_or_else(not_found)?;
        Ok((metadata, supervisor))
    }

    /// Validate inputs, register the workload and write its sources.
    pub async fn create_workload(&self, request: CreateWorkload) -> Result<WorkloadView, HostError> {
        let user_id = UserId::parse(&request.user_id).map_err(|e| HostError::Validation(e.to_string()))?;
        if request.dockerfile.trim().is_empty() {
            return Err(HostError::Validation("dockerfile is empty".to_string()));
        }
        for path in request.files.keys() {
            validate_source_path(path).map_err(|e| HostError::Validation(e.to_string()))?;
        }

        let fingerprint = BuildFingerprint::compute(&request.dockerfile, &request.files);
        let id = WorkloadId::generate(&user_id, &fingerprint);
        let metadata = self.registry.register(Registration { id, fingerprint, user_id })?;

        if let Err(e) = self.persist(&metadata, &request).await {
            tracing::warn!(workload = %metadata.id, error = %e, "create failed, rolling back");
            if let Err(purge) = self.registry.purge(&metadata.id).await {
                tracing::warn!(workload = %metadata.id, error = %purge, "rollback purge failed");
            }
            if let Err(remove) = self.storage.remove(&metadata.id).await {
                tracing::warn!(workload = %metadata.id, error = %remove, "rollback cleanup failed");
            }
            return Err(e);
        }

        tracing::info!(workload = %metadata.id, files = request.files.len(), "created workload");
        self.get(&metadata.id)
    }

    async fn persist(&self, metadata: &WorkloadMetadata, request: &CreateWorkload) -> Result<(), HostError> {
        self.storage.ensure_folders(&metadata.id).await?;
        self.storage.write_sources(&metadata.id, &request.dockerfile, &request.files).await?;
        self.storage.write_metadata(metadata).await?;
        Ok(())
    }

    pub fn start(&self, id: &WorkloadId) -> Result<(), HostError> {
        let (metadata, supervisor) = self.lookup(id)?;
        let lifecycle = supervisor.state().lifecycle;
        if lifecycle.is_active() {
            return Err(HostError::AlreadyRunning { id: id.clone(), lifecycle });
        }

        // Same checks the build runs, surfaced to the caller
        let request = SpecRequest {
            workload_id: id.clone(),
            image: image_tag(id),
            state_dir: self.storage.state_dir(id),
            publish_port: metadata.publish_port,
        };
        self.specs.build_validated(&request).map_err(|e| HostError::Validation(e.to_string()))?;

        supervisor.send_event(Event::UserStartRequested { publish_port: metadata.publish_port })?;
        Ok(())
    }

    pub fn stop(&self, id: &WorkloadId) -> Result<(), HostError> {
        let (_, supervisor) = self.lookup(id)?;
        let lifecycle = supervisor.state().lifecycle;
        if !lifecycle.is_stoppable() {
            return Err(HostError::NotRunning { id: id.clone(), lifecycle });
        }
        supervisor.send_event(Event::UserStopRequested)?;
        Ok(())
    }

    pub fn restart(&self, id: &WorkloadId) -> Result<(), HostError> {
        let (_, supervisor) = self.lookup(id)?;
        let lifecycle = supervisor.state().lifecycle;
        if lifecycle != Lifecycle::Ready {
            return Err(HostError::NotRestartable { id: id.clone(), lifecycle });
        }
        supervisor.send_event(Event::UserRestartRequested)?;
        Ok(())
    }

    pub fn get(&self, id: &WorkloadId) -> Result<WorkloadView, HostError> {
        let (metadata, state) = self.registry.snapshot(id).ok_or_else(|| HostError::NotFound(id.clone()))?;
        Ok(WorkloadView::new(metadata, state))
    }

    pub fn list(&self) -> Vec<WorkloadView> {
        self.registry.list().into_iter().map(|(metadata, state)| WorkloadView::new(metadata, state)).collect()
    }

    /// State updates for one workload.
    pub fn watch(&self, id: &WorkloadId) -> Result<watch::Receiver<WorkloadState>, HostError> {
        let (_, supervisor) = self.lookup(id)?;
        Ok(supervisor.watch())
    }

    /// Halt the supervisor, remove the container, free the port and
    /// delete the workload's files.
    pub async fn purge(&self, id: &WorkloadId) -> Result<(), HostError> {
        let (_, supervisor) = self.lookup(id)?;
        let final_state = supervisor.halt().await;
        self.teardown(&final_state).await;
        self.registry.purge(id).await?;
        self.storage.remove(id).await?;
        tracing::info!(workload = %id, lifecycle = %final_state.lifecycle, "purge complete");
        Ok(())
    }

    /// Remove whatever container the final state points at.
    async fn teardown(&self, state: &WorkloadState) {
        let target = match &state.container_id {
            Some(container_id) => container_id.clone(),
            // Halted while starting: a container may exist under its name
            None if state.lifecycle == Lifecycle::Starting => ContainerId::new(container_name(&state.id)),
            None => return,
        };
        match self.runtime.stop(&target, self.stop_grace, &CancellationToken::new()).await {
            Ok(()) | Err(RuntimeError::NotFound(_)) => {}
            Err(e) => {
                tracing::warn!(workload = %state.id, container = %target.short(12), error = %e, "container removal failed")
            }
        }
    }

    pub async fn proxy(&self, id: &WorkloadId, request: ProxyRequest) -> ProxyResponse {
        self.proxy.forward(id, request).await
    }

    /// Route a full `/programs/{id}/proxy/...` path.
    pub async fn proxy_path(&self, path: &str, request: ProxyRequest) -> ProxyResponse {
        self.proxy.route(path, request).await
    }

    fn container_of(&self, id: &WorkloadId) -> Result<ContainerId, HostError> {
        let (_, supervisor) = self.lookup(id)?;
        let state = supervisor.state();
        state.container_id.ok_or(HostError::NoContainer { id: id.clone(), lifecycle: state.lifecycle })
    }

    pub async fn logs(&self, id: &WorkloadId, tail: usize) -> Result<String, HostError> {
        let container_id = self.container_of(id)?;
        Ok(self.runtime.logs_tail(&container_id, tail).await?)
    }

    pub async fn container_ip(&self, id: &WorkloadId) -> Result<IpAddr, HostError> {
        let container_id = self.container_of(id)?;
        Ok(self.runtime.inspect_ip(&container_id).await?)
    }

    pub fn spawn_monitor(&self, cancel: CancellationToken) -> JoinHandle<()> {
        HealthMonitor::new(Arc::clone(&self.registry), self.health_interval).spawn(cancel)
    }

    /// Halt every supervisor and remove every container. Files are kept.
    pub async fn shutdown(&self) {
        let purged = self.registry.purge_all().await;
        for workload in &purged {
            self.teardown(&workload.final_state).await;
        }
        tracing::info!(workloads = purged.len(), "host shut down");
    }
}

#[cfg(test)]
#[path = "host_tests.rs"]
mod tests;
