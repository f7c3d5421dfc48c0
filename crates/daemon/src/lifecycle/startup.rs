// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use berth_adapters::DockerCli;
use berth_core::SystemClock;
use berth_engine::Host;
use fs2::FileExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Config, DaemonState, LifecycleError};

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // A failed lock means the files belong to the running daemon
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Open without truncating so a running daemon's PID survives a lost race
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    std::fs::create_dir_all(&config.storage_root)?;

    let daemon = &config.daemon;
    let host = Arc::new(Host::new(&daemon.engine, DockerCli::new(&daemon.docker), SystemClock)?);

    let monitor_cancel = CancellationToken::new();
    let monitor = host.spawn_monitor(monitor_cancel.clone());

    info!(
        state_dir = %config.state_dir.display(),
        storage_root = %config.storage_root.display(),
        ports = %format!("{}-{}", daemon.engine.ports.min, daemon.engine.ports.max),
        runtime = %daemon.engine.container.runtime,
        "daemon started",
    );

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        host,
        monitor_cancel,
        monitor,
        start_time: Instant::now(),
    })
}

fn cleanup_on_failure(config: &Config) {
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
