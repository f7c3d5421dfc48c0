// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor

use async_trait::async_trait;
use berth_adapters::{BuildRequest, ContainerRuntime, RuntimeError, StorageLayout};
use berth_core::{
    image_tag, ContainerId, Effect, Event, ImageId, SpecBuilder, SpecRequest, WorkloadId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeEffectHandler;

pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(10);
pub const DEFAULT_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Performs effects on behalf of a supervisor.
///
/// Failures are reported as completion events rather than errors, so every
/// effect either yields the event to feed back or nothing at all.
#[async_trait]
pub trait EffectHandler: Send + Sync + 'static {
    async fn execute(&self, effect: Effect, cancel: &CancellationToken) -> Option<Event>;
}

/// Executes effects against storage and a container runtime
pub struct Executor<R: ContainerRuntime> {
    runtime: Arc<R>,
    storage: StorageLayout,
    specs: SpecBuilder,
    stop_grace: Duration,
    status_timeout: Duration,
}

impl<R: ContainerRuntime> Executor<R> {
    pub fn new(runtime: Arc<R>, storage: StorageLayout, specs: SpecBuilder) -> Self {
        Self {
            runtime,
            storage,
            specs,
            stop_grace: DEFAULT_STOP_GRACE,
            status_timeout: DEFAULT_STATUS_TIMEOUT,
        }
    }

    berth_core::setters! {
        set {
            stop_grace: Duration,
            status_timeout: Duration,
        }
    }

    fn spec_request(&self, workload_id: &WorkloadId, image: String, publish_port: u16) -> SpecRequest {
        SpecRequest {
            workload_id: workload_id.clone(),
            image,
            state_dir: self.storage.state_dir(workload_id),
            publish_port,
        }
    }

    async fn execute_inner(&self, effect: Effect, cancel: &CancellationToken) -> Option<Event> {
        match effect {
            Effect::Emit { event } => Some(event),

            Effect::EnsureFolders { workload_id } => {
                Some(match self.storage.ensure_folders(&workload_id).await {
                    Ok(()) => Event::FoldersEnsured,
                    Err(e) => Event::FoldersFailed { reason: e.to_string() },
                })
            }

            Effect::BuildImage { workload_id, publish_port } => {
                Some(self.build_image(&workload_id, publish_port, cancel).await)
            }

            Effect::StartContainer { workload_id, image_id, publish_port } => {
                Some(self.start_container(&workload_id, &image_id, publish_port, cancel).await)
            }

            Effect::StopContainer { container_id, .. } => {
                Some(match self.runtime.stop(&container_id, self.stop_grace, cancel).await {
                    Ok(()) => Event::StopFinished,
                    Err(e) => Event::StopFailed { reason: e.to_string() },
                })
            }

            Effect::FetchStatus { container_id, .. } => self.fetch_status(&container_id, cancel).await,
        }
    }

    async fn build_image(
        &self,
        workload_id: &WorkloadId,
        publish_port: u16,
        cancel: &CancellationToken,
    ) -> Event {
        let tag = image_tag(workload_id);

        // Reject a contract violation before spending a build on it
        let preflight = self.spec_request(workload_id, tag.clone(), publish_port);
        if let Err(e) = self.specs.build_validated(&preflight) {
            return Event::BuildFailed { reason: format!("container spec rejected: {e}") };
        }

        let request = BuildRequest {
            workload_id: workload_id.clone(),
            context_dir: self.storage.src_dir(workload_id),
            dockerfile: self.storage.dockerfile_path(workload_id),
            tag,
            iid_file: self.storage.image_id_path(workload_id),
            log_file: self.storage.build_log_path(workload_id),
        };
        match self.runtime.build(&request, cancel).await {
            Ok(image_id) => Event::BuildFinished { image_id },
            Err(e) => Event::BuildFailed { reason: e.to_string() },
        }
    }

    async fn start_container(
        &self,
        workload_id: &WorkloadId,
        image_id: &ImageId,
        publish_port: u16,
        cancel: &CancellationToken,
    ) -> Event {
        let request = self.spec_request(workload_id, image_id.to_string(), publish_port);
        let spec = match self.specs.build_validated(&request) {
            Ok(spec) => spec,
            Err(e) => return Event::StartFailed { reason: format!("container spec rejected: {e}") },
        };

        if let Err(e) = self.storage.write_spec(workload_id, &spec).await {
            tracing::warn!(workload = %workload_id, error = %e, "failed to record container spec");
        }

        match self.runtime.start(&spec, cancel).await {
            Ok(container_id) => Event::ContainerStarted { container_id },
            Err(e) => Event::StartFailed { reason: e.to_string() },
        }
    }

    /// `None` while the container runs, or when the probe gave no answer.
    async fn fetch_status(&self, container_id: &ContainerId, cancel: &CancellationToken) -> Option<Event> {
        let probe = tokio::time::timeout(self.status_timeout, self.runtime.status(container_id));
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            result = probe => result,
        };

        match result {
            Err(_) => {
                tracing::warn!(
                    container = %container_id.short(12),
                    timeout_ms = self.status_timeout.as_millis() as u64,
                    "status probe timed out",
                );
                None
            }
            Ok(Ok(status)) if status.is_running() => None,
            Ok(Ok(status)) => Some(Event::HealthExited { exit_code: status.exit_code.unwrap_or(0) }),
            Ok(Err(RuntimeError::Cancelled | RuntimeError::Timeout(_))) => None,
            Ok(Err(e)) => {
                tracing::warn!(container = %container_id.short(12), error = %e, "status probe failed");
                Some(Event::HealthExited { exit_code: -1 })
            }
        }
    }
}

#[async_trait]
impl<R: ContainerRuntime> EffectHandler for Executor<R> {
    async fn execute(&self, effect: Effect, cancel: &CancellationToken) -> Option<Event> {
        // Format the fields as `key=val`
        let info = {
            let fields = effect.fields();
            let cap = fields.iter().map(|(a, b)| a.len() + b.len() + 2).sum();
            let mut fmt = String::with_capacity(cap);
            for (key, val) in fields {
                fmt.push_str(key);
                fmt.push('=');
                fmt.push_str(&val);
                fmt.push(' ');
            }
            fmt.pop();
            fmt
        };

        let op = effect.name();
        let verbose = effect.verbose();
        if verbose {
            tracing::info!("executing effect={} {}", op, info);
        }

        let start = std::time::Instant::now();
        let result = self.execute_inner(effect, cancel).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let failure = result.as_ref().and_then(Event::failure_reason);
        match (&failure, verbose) {
            (Some(reason), _) => {
                tracing::warn!(error = %reason, elapsed_ms, "failed effect={} {}", op, info)
            }
            (None, true) => tracing::info!(
                event = result.as_ref().map(Event::name).unwrap_or("none"),
                elapsed_ms,
                "completed"
            ),
            (None, false) => tracing::debug!(
                event = result.as_ref().map(Event::name).unwrap_or("none"),
                elapsed_ms,
                "executed effect={} {}",
                op,
                info
            ),
        }

        result
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
