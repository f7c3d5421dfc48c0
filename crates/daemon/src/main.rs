// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! berthd: workload lifecycle daemon

use std::path::PathBuf;

use anyhow::Context;
use berth_daemon::{env, startup, Config, DaemonConfig};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[derive(Parser)]
#[command(name = "berthd")]
#[command(about = "Multi-tenant container workload daemon")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = env::CONFIG)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut daemon = DaemonConfig::load(args.config.as_deref())?;
    daemon.apply_env()?;
    let config = Config::new(daemon)?;
    if args.check {
        print!("{}", config.daemon.to_toml()?);
        return Ok(());
    }

    let _log_guard = berth_daemon::logging::init(&config.log_path)
        .with_context(|| format!("open log file {}", config.log_path.display()))?;

    let state = startup(&config).await?;
    info!(pid = std::process::id(), "berthd ready");

    let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }

    state.shutdown().await?;
    Ok(())
}
