// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

mod startup;
pub use startup::startup;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use berth_adapters::DockerCli;
use berth_core::SystemClock;
use berth_engine::{Host, HostError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::DaemonConfig;

/// Host with the production runtime and clock.
pub type DaemonHost = Host<DockerCli, SystemClock>;

/// Daemon paths, resolved from a [`DaemonConfig`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/berth)
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Root of the per-workload trees
    pub storage_root: PathBuf,
    pub daemon: DaemonConfig,
}

impl Config {
    /// Resolve paths. `daemon` should already have env overrides applied.
    pub fn new(mut daemon: DaemonConfig) -> Result<Self, LifecycleError> {
        daemon.resolve()?;
        let state_dir = daemon.state_dir.clone().ok_or(LifecycleError::NoStateDir)?;
        Ok(Self {
            lock_path: state_dir.join("berthd.pid"),
            log_path: state_dir.join("berthd.log"),
            storage_root: daemon.engine.storage_root.clone(),
            state_dir,
            daemon,
        })
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub host: Arc<DaemonHost>,
    monitor_cancel: CancellationToken,
    monitor: JoinHandle<()>,
    pub start_time: Instant,
}

impl DaemonState {
    /// Stop health probing, purge every workload and remove the PID file.
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!(uptime_secs = self.start_time.elapsed().as_secs(), "shutting down daemon");

        self.monitor_cancel.cancel();
        if let Err(e) = self.monitor.await {
            warn!(error = %e, "health monitor task failed");
        }

        self.host.shutdown().await;

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // Lock is released when self.lock_file drops
        info!("daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Host(#[from] HostError),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
