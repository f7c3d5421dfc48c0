// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workload metadata and supervisor-owned state

use crate::fingerprint::BuildFingerprint;
use crate::id::{ContainerId, ImageId, UserId, WorkloadId};
use crate::lifecycle::Lifecycle;
use serde::{Deserialize, Serialize};

/// Registration record. Immutable once the workload is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadMetadata {
    pub id: WorkloadId,
    pub fingerprint: BuildFingerprint,
    pub user_id: UserId,
    /// Loopback host port published to the container's control port.
    pub publish_port: u16,
    pub created_at_ms: u64,
}

/// Mutable lifecycle state. Written only by the workload's supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadState {
    pub id: WorkloadId,
    pub lifecycle: Lifecycle,
    pub publish_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<ImageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<ContainerId>,
    /// Reason for the current `Error` state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Most recent failure reported by an effect, even one that changed nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<String>,
    /// Set by a restart; the next successful stop re-issues a start.
    #[serde(default)]
    pub restart_pending: bool,
    pub last_updated_ms: u64,
}

impl WorkloadState {
    pub fn new(id: WorkloadId, publish_port: u16, now_ms: u64) -> Self {
        Self {
            id,
            lifecycle: Lifecycle::Created,
            publish_port,
            image_id: None,
            container_id: None,
            error: None,
            last_failure: None,
            restart_pending: false,
            last_updated_ms: now_ms,
        }
    }

    pub fn for_metadata(metadata: &WorkloadMetadata) -> Self {
        Self::new(metadata.id.clone(), metadata.publish_port, metadata.created_at_ms)
    }
}
