// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! berth daemon library
//!
//! Configuration loading and the daemon lifecycle, shared by the `berthd`
//! binary and its tests.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod env;
pub mod lifecycle;
pub mod logging;

#[cfg(test)]
mod test_env;

pub use config::DaemonConfig;
pub use lifecycle::{startup, Config, DaemonHost, DaemonState, LifecycleError};
