// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic health probes.
//!
//! The monitor only triggers: it sends `StatusProbe` into each supervisor
//! whose workload should have a live container, and the supervisor decides
//! what a failed probe means.
//!
//! Starting workloads get a `StatusProbe` too, but the reducer only acts on
//! it in Ready. In Starting it is dropped at trace level and never reaches
//! the runtime. Ready follows from `ContainerStarted` alone.

use crate::registry::Registry;
use crate::supervisor::SupervisorError;
use berth_core::{Clock, Event, Lifecycle};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(1);

pub struct HealthMonitor<C: Clock> {
    registry: Arc<Registry<C>>,
    interval: Duration,
}

impl<C: Clock> HealthMonitor<C> {
    pub fn new(registry: Arc<Registry<C>>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Send one `StatusProbe` to each workload whose lifecycle `is_probed`. Returns the count sent.
    pub fn tick(&self) -> usize {
        let mut sent = 0;
        for lifecycle in Lifecycle::ALL.into_iter().filter(|l| l.is_probed()) {
            self.registry.range_by_state(lifecycle, |metadata, supervisor| {
                match supervisor.send_event(Event::StatusProbe) {
                    Ok(()) => sent += 1,
                    Err(SupervisorError::InboxFull(_)) => {
                        tracing::warn!(workload = %metadata.id, "inbox full, skipping probe");
                    }
                    // Purged between snapshot and send
                    Err(SupervisorError::Stopped(_)) => {}
                }
                true
            });
        }
        sent
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(interval_ms = self.interval.as_millis() as u64, "health monitor started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let sent = self.tick();
                        tracing::trace!(sent, "health tick");
                    }
                }
            }
            tracing::info!("health monitor stopped");
        })
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
