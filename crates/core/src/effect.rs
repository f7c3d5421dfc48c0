// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects represent side effects a supervisor asks the handler to perform

use crate::event::Event;
use crate::id::{ContainerId, ImageId, WorkloadId};
use serde::{Deserialize, Serialize};

/// Effects produced by the reducer and executed by the effect handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Feed an event back into the emitting supervisor's inbox
    Emit { event: Event },

    /// Create the per-workload directory tree
    EnsureFolders { workload_id: WorkloadId },

    /// Validate spec prerequisites, then build the workload image
    BuildImage { workload_id: WorkloadId, publish_port: u16 },

    /// Build and validate the container spec, then start the container
    StartContainer { workload_id: WorkloadId, image_id: ImageId, publish_port: u16 },

    /// Stop with a bounded grace window, then remove
    StopContainer { workload_id: WorkloadId, container_id: ContainerId },

    /// Ask the runtime whether the container is still running
    FetchStatus { workload_id: WorkloadId, container_id: ContainerId },
}

impl Effect {
    /// Effect name for log spans (e.g., "build_image", "stop_container")
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Emit { .. } => "emit",
            Effect::EnsureFolders { .. } => "ensure_folders",
            Effect::BuildImage { .. } => "build_image",
            Effect::StartContainer { .. } => "start_container",
            Effect::StopContainer { .. } => "stop_container",
            Effect::FetchStatus { .. } => "fetch_status",
        }
    }

    /// Key-value pairs for structured logging
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Emit { event } => vec![("event", event.log_summary())],
            Effect::EnsureFolders { workload_id } => vec![("workload", workload_id.to_string())],
            Effect::BuildImage { workload_id, publish_port } => vec![
                ("workload", workload_id.to_string()),
                ("port", publish_port.to_string()),
            ],
            Effect::StartContainer { workload_id, image_id, publish_port } => vec![
                ("workload", workload_id.to_string()),
                ("image", image_id.short(19).to_string()),
                ("port", publish_port.to_string()),
            ],
            Effect::StopContainer { workload_id, container_id }
            | Effect::FetchStatus { workload_id, container_id } => vec![
                ("workload", workload_id.to_string()),
                ("container", container_id.short(12).to_string()),
            ],
        }
    }

    /// Whether to log both 'executing' and 'completed' or a single line.
    pub fn verbose(&self) -> bool {
        // Status probes fire every health interval
        !matches!(self, Effect::Emit { .. } | Effect::FetchStatus { .. })
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
