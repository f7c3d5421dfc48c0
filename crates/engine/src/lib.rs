// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! berth-engine: supervisors, registry, health monitor and proxy

pub mod config;
mod error;
pub mod executor;
mod host;
pub mod monitor;
pub mod ports;
pub mod proxy;
pub mod registry;
pub mod supervisor;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{ConfigError, EngineConfig};
pub use error::HostError;
pub use executor::{EffectHandler, Executor};
pub use host::{CreateWorkload, Host, WorkloadView};
pub use monitor::HealthMonitor;
pub use ports::{PortAllocator, PortError, PortRange};
pub use proxy::{parse_proxy_path, ProxyRequest, ProxyResponse, ProxyRouter};
pub use registry::{PurgedWorkload, Registration, Registry, RegistryError};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorError, Transition};

#[cfg(any(test, feature = "test-support"))]
pub use executor::FakeEffectHandler;
