// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workload lifecycle states

use serde::{Deserialize, Serialize};

/// Where a workload is in its build/run cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    Created,
    Building,
    Starting,
    Ready,
    Stopping,
    Stopped,
    Error,
}

crate::simple_display! {
    Lifecycle {
        Created => "Created",
        Building => "Building",
        Starting => "Starting",
        Ready => "Ready",
        Stopping => "Stopping",
        Stopped => "Stopped",
        Error => "Error",
    }
}

impl Lifecycle {
    pub const ALL: [Lifecycle; 7] = [
        Lifecycle::Created,
        Lifecycle::Building,
        Lifecycle::Starting,
        Lifecycle::Ready,
        Lifecycle::Stopping,
        Lifecycle::Stopped,
        Lifecycle::Error,
    ];

    /// States with an effect in flight whose completion event is awaited.
    pub fn is_transitional(self) -> bool {
        matches!(self, Lifecycle::Building | Lifecycle::Starting | Lifecycle::Stopping)
    }

    /// States in which a start request is redundant.
    pub fn is_active(self) -> bool {
        matches!(self, Lifecycle::Building | Lifecycle::Starting | Lifecycle::Ready)
    }

    /// States the health monitor checks. Only Ready acts on the check.
    pub fn is_probed(self) -> bool {
        matches!(self, Lifecycle::Starting | Lifecycle::Ready)
    }

    /// States from which a stop request makes sense.
    pub fn is_stoppable(self) -> bool {
        matches!(self, Lifecycle::Building | Lifecycle::Starting | Lifecycle::Ready | Lifecycle::Stopping)
    }

    /// Whether `self -> next` is an edge of the lifecycle state machine.
    pub fn can_transition_to(self, next: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (self, next),
            (Created, Building)
                | (Building, Starting)
                | (Building, Error)
                | (Starting, Ready)
                | (Starting, Error)
                | (Ready, Stopping)
                | (Ready, Error)
                | (Stopping, Stopped)
                | (Stopping, Error)
                | (Stopped, Building)
                | (Error, Building)
        )
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
