// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! berth-core: workload lifecycle types and the pure reducer

pub mod macros;

pub mod clock;
pub mod container;
pub mod effect;
pub mod event;
pub mod fingerprint;
pub mod id;
pub mod lifecycle;
pub mod reducer;
pub mod workload;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use container::{
    container_name, image_tag, ContainerSettings, ContainerSpec, PortBinding, ResourceLimits,
    SpecBuilder, SpecError, SpecRequest, VolumeMount, CONTROL_PORT, STATE_MOUNT,
};
pub use effect::Effect;
pub use event::Event;
pub use fingerprint::BuildFingerprint;
pub use id::{short, ContainerId, IdError, ImageId, UserId, WorkloadId};
pub use lifecycle::Lifecycle;
pub use reducer::{reduce, Disposition, Reduction};
pub use workload::{WorkloadMetadata, WorkloadState};
