// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted effect handler for supervisor tests

use super::EffectHandler;
use async_trait::async_trait;
use berth_core::{ContainerId, Effect, Event, ImageId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeHandlerState {
    executed: Vec<Effect>,
    images: u32,
    containers: u32,
    failures: HashMap<&'static str, String>,
    held: HashSet<&'static str>,
    exit_code: Option<i32>,
}

/// Effect handler that answers every effect with its success event.
///
/// Effects are keyed by [`Effect::name`]. A failing kind answers with its
/// failure event; a held kind answers nothing, leaving the supervisor in its
/// transitional state until the test sends the completion itself.
#[derive(Clone, Default)]
pub struct FakeEffectHandler {
    inner: Arc<Mutex<FakeHandlerState>>,
    executed_notify: Arc<Notify>,
}

impl FakeEffectHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> Vec<Effect> {
        self.inner.lock().executed.clone()
    }

    pub fn executed_names(&self) -> Vec<&'static str> {
        self.inner.lock().executed.iter().map(Effect::name).collect()
    }

    pub fn fail(&self, kind: &'static str, reason: impl Into<String>) {
        self.inner.lock().failures.insert(kind, reason.into());
    }

    pub fn clear_failures(&self) {
        self.inner.lock().failures.clear();
    }

    pub fn hold(&self, kind: &'static str) {
        self.inner.lock().held.insert(kind);
    }

    pub fn release(&self, kind: &'static str) {
        self.inner.lock().held.remove(kind);
    }

    /// Make status probes report the container exited with `code`.
    pub fn set_exited(&self, code: i32) {
        self.inner.lock().exit_code = Some(code);
    }

    /// Wait until at least `n` effects have been executed.
    pub async fn wait_for_executed(&self, n: usize) {
        loop {
            let notified = self.executed_notify.notified();
            if self.inner.lock().executed.len() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl EffectHandler for FakeEffectHandler {
    async fn execute(&self, effect: Effect, _cancel: &CancellationToken) -> Option<Event> {
        let kind = effect.name();
        let event = {
            let mut inner = self.inner.lock();
            inner.executed.push(effect.clone());

            if inner.held.contains(kind) {
                None
            } else if let Some(reason) = inner.failures.get(kind).cloned() {
                match effect {
                    Effect::Emit { event } => Some(event),
                    Effect::EnsureFolders { .. } => Some(Event::FoldersFailed { reason }),
                    Effect::BuildImage { .. } => Some(Event::BuildFailed { reason }),
                    Effect::StartContainer { .. } => Some(Event::StartFailed { reason }),
                    Effect::StopContainer { .. } => Some(Event::StopFailed { reason }),
                    Effect::FetchStatus { .. } => Some(Event::HealthExited { exit_code: -1 }),
                }
            } else {
                match effect {
                    Effect::Emit { event } => Some(event),
                    Effect::EnsureFolders { .. } => Some(Event::FoldersEnsured),
                    Effect::BuildImage { .. } => {
                        inner.images += 1;
                        Some(Event::BuildFinished {
                            image_id: ImageId::new(format!("sha256:img{}", inner.images)),
                        })
                    }
                    Effect::StartContainer { .. } => {
                        inner.containers += 1;
                        Some(Event::ContainerStarted {
                            container_id: ContainerId::new(format!("c{}", inner.containers)),
                        })
                    }
                    Effect::StopContainer { .. } => Some(Event::StopFinished),
                    Effect::FetchStatus { .. } => {
                        inner.exit_code.map(|exit_code| Event::HealthExited { exit_code })
                    }
                }
            }
        };
        self.executed_notify.notify_waiters();
        event
    }
}
