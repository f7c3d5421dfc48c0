// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{
    BuildFingerprint, ContainerId, ImageId, Lifecycle, UserId, WorkloadId, WorkloadMetadata,
    WorkloadState,
};

pub const TEST_PORT: u16 = 19001;

pub fn workload_id(n: u32) -> WorkloadId {
    WorkloadId::new(format!("u1-build-0123456789ab-{n:08}"))
}

pub fn metadata(n: u32, publish_port: u16) -> WorkloadMetadata {
    WorkloadMetadata {
        id: workload_id(n),
        fingerprint: BuildFingerprint::new("build-0123456789ab"),
        user_id: UserId::new("u1"),
        publish_port,
        created_at_ms: 1_000_000,
    }
}

/// A state sitting in `lifecycle` with the fields that lifecycle implies.
pub fn state_in(lifecycle: Lifecycle) -> WorkloadState {
    let mut state = WorkloadState::new(workload_id(1), TEST_PORT, 1_000_000);
    state.lifecycle = lifecycle;
    if !matches!(lifecycle, Lifecycle::Created | Lifecycle::Building) {
        state.image_id = Some(ImageId::new("sha256:img1"));
    }
    if matches!(lifecycle, Lifecycle::Ready | Lifecycle::Stopping) {
        state.container_id = Some(ContainerId::new("c1"));
    }
    if lifecycle == Lifecycle::Error {
        state.error = Some("start: boom".to_string());
    }
    state
}

/// Proptest strategies for core state machine types.
pub mod strategies {
    use crate::{ContainerId, Event, ImageId, Lifecycle};
    use proptest::prelude::*;

    pub fn arb_lifecycle() -> impl Strategy<Value = Lifecycle> {
        proptest::sample::select(Lifecycle::ALL.to_vec())
    }

    pub fn arb_event() -> impl Strategy<Value = Event> {
        prop_oneof![
            (19001u16..19010).prop_map(|publish_port| Event::UserStartRequested { publish_port }),
            Just(Event::UserStopRequested),
            Just(Event::UserRestartRequested),
            Just(Event::FoldersEnsured),
            "[a-z]{1,8}".prop_map(|reason| Event::FoldersFailed { reason }),
            (1u32..5).prop_map(|n| Event::BuildFinished { image_id: ImageId::new(format!("img{n}")) }),
            "[a-z]{1,8}".prop_map(|reason| Event::BuildFailed { reason }),
            (1u32..5).prop_map(|n| Event::ContainerStarted {
                container_id: ContainerId::new(format!("c{n}"))
            }),
            "[a-z]{1,8}".prop_map(|reason| Event::StartFailed { reason }),
            Just(Event::StopFinished),
            "[a-z]{1,8}".prop_map(|reason| Event::StopFailed { reason }),
            (-1i32..140).prop_map(|exit_code| Event::HealthExited { exit_code }),
            Just(Event::StatusProbe),
        ]
    }
}
