// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of live workloads.
//!
//! Registration reserves a port, spawns the supervisor and records the
//! metadata under one write lock, so no reader sees a partial entry.

use crate::executor::EffectHandler;
use crate::ports::{PortAllocator, PortError};
use crate::supervisor::{Supervisor, SupervisorConfig};
use berth_core::{BuildFingerprint, Clock, Lifecycle, UserId, WorkloadId, WorkloadMetadata, WorkloadState};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("workload {0} already exists")]
    AlreadyExists(WorkloadId),
    #[error("workload {0} not found")]
    NotFound(WorkloadId),
    #[error(transparent)]
    Ports(#[from] PortError),
}

/// Inputs for a new registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub id: WorkloadId,
    pub fingerprint: BuildFingerprint,
    pub user_id: UserId,
}

/// What was left of a workload when it was purged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgedWorkload {
    pub metadata: WorkloadMetadata,
    pub final_state: WorkloadState,
}

struct Entry {
    metadata: WorkloadMetadata,
    supervisor: Arc<Supervisor>,
}

pub struct Registry<C: Clock> {
    entries: RwLock<HashMap<WorkloadId, Entry>>,
    ports: PortAllocator,
    handler: Arc<dyn EffectHandler>,
    clock: C,
    supervisor_config: SupervisorConfig,
}

impl<C: Clock> Registry<C> {
    pub fn new(
        ports: PortAllocator,
        handler: Arc<dyn EffectHandler>,
        clock: C,
        supervisor_config: SupervisorConfig,
    ) -> Self {
        Self { entries: RwLock::new(HashMap::new()), ports, handler, clock, supervisor_config }
    }

    pub fn ports(&self) -> &PortAllocator {
        &self.ports
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Reserve a port and spawn a supervisor in `Created`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn register(&self, registration: Registration) -> Result<WorkloadMetadata, RegistryError> {
        let mut entries = self.entries.write();
        if entries.contains_key(&registration.id) {
            return Err(RegistryError::AlreadyExists(registration.id));
        }

        let publish_port = self.ports.allocate()?;
        let metadata = WorkloadMetadata {
            id: registration.id,
            fingerprint: registration.fingerprint,
            user_id: registration.user_id,
            publish_port,
            created_at_ms: self.clock.epoch_ms(),
        };
        let supervisor = Supervisor::spawn(
            WorkloadState::for_metadata(&metadata),
            Arc::clone(&self.handler),
            self.clock.clone(),
            self.supervisor_config,
        );
        entries.insert(metadata.id.clone(), Entry { metadata: metadata.clone(), supervisor });

        tracing::info!(workload = %metadata.id, user = %metadata.user_id, port = publish_port, "registered workload");
        Ok(metadata)
    }

    pub fn get(&self, id: &WorkloadId) -> Option<WorkloadMetadata> {
        self.entries.read().get(id).map(|e| e.metadata.clone())
    }

    pub fn get_supervisor(&self, id: &WorkloadId) -> Option<Arc<Supervisor>> {
        self.entries.read().get(id).map(|e| Arc::clone(&e.supervisor))
    }

    pub fn exists(&self, id: &WorkloadId) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Metadata and current state of one workload.
    pub fn snapshot(&self, id: &WorkloadId) -> Option<(WorkloadMetadata, WorkloadState)> {
        let entries = self.entries.read();
        let entry = entries.get(id)?;
        Some((entry.metadata.clone(), entry.supervisor.state()))
    }

    /// All workloads, oldest first.
    pub fn list(&self) -> Vec<(WorkloadMetadata, WorkloadState)> {
        let mut all: Vec<_> = self
            .entries
            .read()
            .values()
            .map(|e| (e.metadata.clone(), e.supervisor.state()))
            .collect();
        all.sort_by(|(a, _), (b, _)| a.created_at_ms.cmp(&b.created_at_ms).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Visit every workload currently in `lifecycle` until `f` returns false.
    ///
    /// Runs over a snapshot taken under the read lock; `f` itself is called
    /// without the lock held and may register or purge.
    pub fn range_by_state(
        &self,
        lifecycle: Lifecycle,
        mut f: impl FnMut(&WorkloadMetadata, &Arc<Supervisor>) -> bool,
    ) {
        let snapshot: Vec<(WorkloadMetadata, Arc<Supervisor>)> = self
            .entries
            .read()
            .values()
            .map(|e| (e.metadata.clone(), Arc::clone(&e.supervisor)))
            .collect();
        for (metadata, supervisor) in &snapshot {
            if supervisor.state().lifecycle == lifecycle && !f(metadata, supervisor) {
                break;
            }
        }
    }

    /// Remove the entry, halt its supervisor and release its port.
    pub async fn purge(&self, id: &WorkloadId) -> Result<PurgedWorkload, RegistryError> {
        let entry = self.entries.write().remove(id).ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        let final_state = entry.supervisor.halt().await;
        if let Err(e) = self.ports.release(entry.metadata.publish_port) {
            tracing::warn!(workload = %id, error = %e, "port release failed");
        }
        tracing::info!(workload = %id, lifecycle = %final_state.lifecycle, "purged workload");
        Ok(PurgedWorkload { metadata: entry.metadata, final_state })
    }

    /// Purge everything, for shutdown.
    pub async fn purge_all(&self) -> Vec<PurgedWorkload> {
        let ids: Vec<WorkloadId> = self.entries.read().keys().cloned().collect();
        let mut purged = Vec::with_capacity(ids.len());
        for id in ids {
            if let Ok(p) = self.purge(&id).await {
                purged.push(p);
            }
        }
        purged
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
