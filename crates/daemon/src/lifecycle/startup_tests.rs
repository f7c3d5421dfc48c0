// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use fs2::FileExt;
use tempfile::tempdir;

use super::*;
use crate::config::DaemonConfig;

fn test_config(dir: &Path) -> Config {
    let daemon = DaemonConfig { state_dir: Some(dir.to_path_buf()), ..Default::default() };
    Config::new(daemon).unwrap()
}

#[tokio::test]
async fn startup_writes_pid_and_creates_storage_root() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let daemon = startup(&config).await.unwrap();

    let pid = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    assert!(config.storage_root.is_dir());
    assert!(daemon.host.list().is_empty());

    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn second_startup_fails_on_lock() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    let first = startup(&config).await.unwrap();
    let err = startup(&config).await.err().unwrap();
    assert!(matches!(err, LifecycleError::LockFailed(_)), "{err}");

    // The running daemon's PID file is untouched
    let pid = std::fs::read_to_string(&config.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());

    first.shutdown().await.unwrap();
}

#[tokio::test]
async fn startup_lock_failed_keeps_foreign_pid() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    std::fs::write(&config.lock_path, b"4242\n").unwrap();
    let held = std::fs::OpenOptions::new().write(true).open(&config.lock_path).unwrap();
    held.try_lock_exclusive().unwrap();

    let err = startup(&config).await.err().unwrap();
    assert!(matches!(err, LifecycleError::LockFailed(_)));
    assert_eq!(std::fs::read_to_string(&config.lock_path).unwrap(), "4242\n");
}

#[tokio::test]
async fn invalid_engine_config_cleans_up_pid_file() {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.daemon.engine.container.runtime = "runc".to_string();

    let err = startup(&config).await.err().unwrap();
    assert!(matches!(err, LifecycleError::Host(_)), "{err}");
    assert!(!config.lock_path.exists());
}

#[tokio::test]
async fn restart_after_shutdown_succeeds() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    startup(&config).await.unwrap().shutdown().await.unwrap();
    let again = startup(&config).await.unwrap();
    again.shutdown().await.unwrap();
}
