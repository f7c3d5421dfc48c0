// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events delivered to a workload supervisor

use crate::id::{ContainerId, ImageId};
use serde::{Deserialize, Serialize};

/// Inputs to the lifecycle reducer.
///
/// User commands arrive from the lifecycle RPC. Completion events come back
/// from the effect handler. `StatusProbe` is sent by the health monitor.
/// Serializes with `{"type": "event:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- user commands --
    #[serde(rename = "user:start")]
    UserStartRequested { publish_port: u16 },

    #[serde(rename = "user:stop")]
    UserStopRequested,

    #[serde(rename = "user:restart")]
    UserRestartRequested,

    // -- effect completions --
    #[serde(rename = "folders:ensured")]
    FoldersEnsured,

    #[serde(rename = "folders:failed")]
    FoldersFailed { reason: String },

    #[serde(rename = "build:finished")]
    BuildFinished { image_id: ImageId },

    #[serde(rename = "build:failed")]
    BuildFailed { reason: String },

    #[serde(rename = "container:started")]
    ContainerStarted { container_id: ContainerId },

    #[serde(rename = "container:start_failed")]
    StartFailed { reason: String },

    #[serde(rename = "container:stopped")]
    StopFinished,

    #[serde(rename = "container:stop_failed")]
    StopFailed { reason: String },

    // -- health --
    #[serde(rename = "health:exited")]
    HealthExited { exit_code: i32 },

    #[serde(rename = "health:probe")]
    StatusProbe,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::UserStartRequested { .. } => "user:start",
            Event::UserStopRequested => "user:stop",
            Event::UserRestartRequested => "user:restart",
            Event::FoldersEnsured => "folders:ensured",
            Event::FoldersFailed { .. } => "folders:failed",
            Event::BuildFinished { .. } => "build:finished",
            Event::BuildFailed { .. } => "build:failed",
            Event::ContainerStarted { .. } => "container:started",
            Event::StartFailed { .. } => "container:start_failed",
            Event::StopFinished => "container:stopped",
            Event::StopFailed { .. } => "container:stop_failed",
            Event::HealthExited { .. } => "health:exited",
            Event::StatusProbe => "health:probe",
        }
    }

    /// One-line description for logs.
    pub fn log_summary(&self) -> String {
        let name = self.name();
        match self {
            Event::UserStartRequested { publish_port } => format!("{name} port={publish_port}"),
            Event::BuildFinished { image_id } => format!("{name} image={}", image_id.short(19)),
            Event::ContainerStarted { container_id } => {
                format!("{name} container={}", container_id.short(12))
            }
            Event::HealthExited { exit_code } => format!("{name} code={exit_code}"),
            Event::FoldersFailed { reason }
            | Event::BuildFailed { reason }
            | Event::StartFailed { reason }
            | Event::StopFailed { reason } => format!("{name} reason={reason}"),
            _ => name.to_string(),
        }
    }

    /// Commands issued on a user's behalf, as opposed to effect completions.
    pub fn is_user_command(&self) -> bool {
        matches!(
            self,
            Event::UserStartRequested { .. }
                | Event::UserStopRequested
                | Event::UserRestartRequested
        )
    }

    /// Failure text carried by a failed effect completion.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Event::FoldersFailed { reason } => Some(format!("ensure folders: {reason}")),
            Event::BuildFailed { reason } => Some(format!("build: {reason}")),
            Event::StartFailed { reason } => Some(format!("start: {reason}")),
            Event::StopFailed { reason } => Some(format!("stop: {reason}")),
            Event::HealthExited { exit_code } => Some(format!("exited code={exit_code}")),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
