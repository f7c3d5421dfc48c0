// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure lifecycle reducer: `(state, event) -> (state', effects)`

use crate::effect::Effect;
use crate::event::Event;
use crate::lifecycle::Lifecycle;
use crate::workload::WorkloadState;

/// What the reducer did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The event matched a transition (possibly a self-transition).
    Applied,
    /// A user command arrived while an effect is in flight; the caller
    /// should hold it and offer it again after the next lifecycle change.
    Deferred,
    /// No transition exists for this event in the current state.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    pub state: WorkloadState,
    pub effects: Vec<Effect>,
    pub disposition: Disposition,
}

impl Reduction {
    fn applied(state: WorkloadState, effects: Vec<Effect>) -> Self {
        Self { state, effects, disposition: Disposition::Applied }
    }

    fn unchanged(state: &WorkloadState, disposition: Disposition) -> Self {
        Self { state: state.clone(), effects: Vec::new(), disposition }
    }
}

/// Compute the next state and the effects to run for one event.
///
/// `last_updated_ms` is left untouched; the supervisor stamps it.
pub fn reduce(state: &WorkloadState, event: &Event) -> Reduction {
    use Lifecycle::*;

    let id = &state.id;
    match (state.lifecycle, event) {
        (Created | Stopped | Error, Event::UserStartRequested { publish_port }) => {
            let mut next = state.clone();
            next.lifecycle = Building;
            next.publish_port = *publish_port;
            next.error = None;
            next.restart_pending = false;
            // Set again by ContainerStarted
            next.container_id = None;
            let effects = vec![
                Effect::EnsureFolders { workload_id: id.clone() },
                Effect::BuildImage { workload_id: id.clone(), publish_port: *publish_port },
            ];
            Reduction::applied(next, effects)
        }

        (Building, Event::FoldersEnsured) => Reduction::applied(state.clone(), Vec::new()),

        (Building, Event::BuildFinished { image_id }) => {
            let mut next = state.clone();
            next.lifecycle = Starting;
            next.image_id = Some(image_id.clone());
            let effects = vec![Effect::StartContainer {
                workload_id: id.clone(),
                image_id: image_id.clone(),
                publish_port: state.publish_port,
            }];
            Reduction::applied(next, effects)
        }

        (Starting, Event::ContainerStarted { container_id }) => {
            let mut next = state.clone();
            next.lifecycle = Ready;
            next.container_id = Some(container_id.clone());
            Reduction::applied(next, Vec::new())
        }

        (Building, Event::FoldersFailed { .. } | Event::BuildFailed { .. })
        | (Starting, Event::StartFailed { .. })
        | (Ready, Event::HealthExited { .. })
        | (Stopping, Event::StopFailed { .. }) => {
            let mut next = state.clone();
            let reason = event.failure_reason().unwrap_or_default();
            next.lifecycle = Error;
            next.error = Some(reason.clone());
            next.last_failure = Some(reason);
            next.restart_pending = false;
            Reduction::applied(next, Vec::new())
        }

        (Ready, Event::UserStopRequested | Event::UserRestartRequested) => {
            let Some(container_id) = state.container_id.clone() else {
                return Reduction::unchanged(state, Disposition::Ignored);
            };
            let mut next = state.clone();
            next.lifecycle = Stopping;
            next.restart_pending = matches!(event, Event::UserRestartRequested);
            let effects = vec![Effect::StopContainer { workload_id: id.clone(), container_id }];
            Reduction::applied(next, effects)
        }

        (Ready, Event::StatusProbe) => match &state.container_id {
            Some(container_id) => Reduction::applied(
                state.clone(),
                vec![Effect::FetchStatus {
                    workload_id: id.clone(),
                    container_id: container_id.clone(),
                }],
            ),
            None => Reduction::unchanged(state, Disposition::Ignored),
        },

        (Stopping, Event::StopFinished) => {
            let mut next = state.clone();
            next.lifecycle = Stopped;
            next.container_id = None;
            let mut effects = Vec::new();
            if next.restart_pending {
                next.restart_pending = false;
                effects.push(Effect::Emit {
                    event: Event::UserStartRequested { publish_port: state.publish_port },
                });
            }
            Reduction::applied(next, effects)
        }

        (lifecycle, event) if lifecycle.is_transitional() && event.is_user_command() => {
            Reduction::unchanged(state, Disposition::Deferred)
        }

        (_, event) => {
            let mut reduction = Reduction::unchanged(state, Disposition::Ignored);
            if let Some(reason) = event.failure_reason() {
                reduction.state.last_failure = Some(reason);
            }
            reduction
        }
    }
}

#[cfg(test)]
#[path = "reducer_tests.rs"]
mod tests;
