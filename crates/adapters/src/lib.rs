// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! berth-adapters: container engine and filesystem adapters

pub mod runtime;
pub mod storage;

pub use runtime::{
    BuildRequest, ContainerRuntime, ContainerState, ContainerStatus, DockerCli, RuntimeError,
};
pub use storage::{StorageError, StorageLayout};

#[cfg(any(test, feature = "test-support"))]
pub use runtime::{FakeRuntime, RuntimeCall};
