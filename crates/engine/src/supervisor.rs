// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workload supervisor.
//!
//! Each supervisor owns two tasks. The reduce loop drains a bounded inbox,
//! applies [`reduce`] and publishes the new state. Effects go to a single
//! worker that runs them in order and feeds completion events back into the
//! inbox. The reduce loop never waits on an effect.
//!
//! User commands that arrive while an effect is in flight are held and
//! offered again, in arrival order, after the next lifecycle change.

use crate::executor::EffectHandler;
use berth_core::{reduce, Clock, Disposition, Effect, Event, Lifecycle, Reduction, WorkloadId, WorkloadState};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub const DEFAULT_INBOX_CAPACITY: usize = 1000;

const TRANSITION_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub inbox_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self { inbox_capacity: DEFAULT_INBOX_CAPACITY }
    }
}

/// A lifecycle change, published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub workload_id: WorkloadId,
    pub from: Lifecycle,
    pub to: Lifecycle,
    pub event: &'static str,
    pub at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SupervisorError {
    #[error("supervisor for {0} has stopped")]
    Stopped(WorkloadId),
    #[error("inbox for {0} is full")]
    InboxFull(WorkloadId),
}

pub struct Supervisor {
    id: WorkloadId,
    inbox: mpsc::Sender<Event>,
    state: watch::Receiver<WorkloadState>,
    transitions: broadcast::Sender<Transition>,
    cancel: CancellationToken,
    tasks: tokio::sync::Mutex<Option<(JoinHandle<()>, JoinHandle<()>)>>,
}

impl Supervisor {
    /// Start the supervisor's tasks. Must be called inside a tokio runtime.
    pub fn spawn<C: Clock>(
        initial: WorkloadState,
        handler: Arc<dyn EffectHandler>,
        clock: C,
        config: SupervisorConfig,
    ) -> Arc<Self> {
        let id = initial.id.clone();
        let (inbox_tx, inbox_rx) = mpsc::channel(config.inbox_capacity.max(1));
        let (effects_tx, effects_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(initial);
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        let cancel = CancellationToken::new();

        let span = tracing::info_span!("supervisor", workload = %id);
        let reduce_loop = ReduceLoop {
            state: state_tx,
            transitions: transitions.clone(),
            effects: effects_tx,
            deferred: VecDeque::new(),
            replay: VecDeque::new(),
            clock,
        };
        let reduce_task =
            tokio::spawn(reduce_loop.run(inbox_rx, cancel.clone()).instrument(span.clone()));
        let effect_task = tokio::spawn(
            run_effects(handler, effects_rx, inbox_tx.clone(), cancel.clone()).instrument(span),
        );

        tracing::debug!(workload = %id, "supervisor started");
        Arc::new(Self {
            id,
            inbox: inbox_tx,
            state: state_rx,
            transitions,
            cancel,
            tasks: tokio::sync::Mutex::new(Some((reduce_task, effect_task))),
        })
    }

    pub fn id(&self) -> &WorkloadId {
        &self.id
    }

    /// Queue an event without waiting.
    pub fn send_event(&self, event: Event) -> Result<(), SupervisorError> {
        if self.cancel.is_cancelled() {
            return Err(SupervisorError::Stopped(self.id.clone()));
        }
        self.inbox.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SupervisorError::InboxFull(self.id.clone()),
            mpsc::error::TrySendError::Closed(_) => SupervisorError::Stopped(self.id.clone()),
        })
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> WorkloadState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<WorkloadState> {
        self.state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Wait until the state satisfies `pred`. Returns `None` if the
    /// supervisor halts first.
    pub async fn wait_for(&self, mut pred: impl FnMut(&WorkloadState) -> bool) -> Option<WorkloadState> {
        let mut rx = self.state.clone();
        let result = rx.wait_for(|state| pred(state)).await.ok().map(|state| state.clone());
        result
    }

    pub fn is_halted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel in-flight effects, stop both tasks and return the final state.
    /// Safe to call more than once; later calls wait for the first.
    pub async fn halt(&self) -> WorkloadState {
        self.cancel.cancel();
        let mut tasks = self.tasks.lock().await;
        if let Some((reduce_task, effect_task)) = tasks.take() {
            for task in [reduce_task, effect_task] {
                if let Err(e) = task.await {
                    tracing::error!(workload = %self.id, error = %e, "supervisor task panicked");
                }
            }
            tracing::debug!(workload = %self.id, "supervisor halted");
        }
        drop(tasks);
        self.state()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ReduceLoop<C: Clock> {
    state: watch::Sender<WorkloadState>,
    transitions: broadcast::Sender<Transition>,
    effects: mpsc::UnboundedSender<Effect>,
    /// User commands waiting for a lifecycle change
    deferred: VecDeque<Event>,
    /// Deferred commands released by a lifecycle change, ahead of the inbox
    replay: VecDeque<Event>,
    clock: C,
}

impl<C: Clock> ReduceLoop<C> {
    async fn run(mut self, mut inbox: mpsc::Receiver<Event>, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let event = match self.replay.pop_front() {
                Some(event) => event,
                None => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = inbox.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                },
            };
            self.step(event);
        }

        inbox.close();
        let mut dropped = 0usize;
        while inbox.try_recv().is_ok() {
            dropped += 1;
        }
        dropped += self.deferred.len() + self.replay.len();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded pending events on halt");
        }
    }

    fn step(&mut self, event: Event) {
        let current = self.state.borrow().clone();
        let Reduction { state: mut next, effects, disposition } = reduce(&current, &event);

        match disposition {
            Disposition::Deferred => {
                tracing::debug!(
                    event = %event.log_summary(),
                    lifecycle = %current.lifecycle,
                    "deferred until lifecycle changes",
                );
                self.deferred.push_back(event);
                return;
            }
            Disposition::Ignored if matches!(event, Event::StatusProbe) => {
                tracing::trace!(lifecycle = %current.lifecycle, "probe skipped");
            }
            Disposition::Ignored => {
                tracing::warn!(
                    event = %event.log_summary(),
                    lifecycle = %current.lifecycle,
                    "event not applicable, dropped",
                );
            }
            Disposition::Applied => {}
        }

        let now = self.clock.epoch_ms();
        if next != current {
            next.last_updated_ms = now;
            self.state.send_replace(next.clone());
        }

        if next.lifecycle != current.lifecycle {
            tracing::info!(
                from = %current.lifecycle,
                to = %next.lifecycle,
                event = event.name(),
                "lifecycle transition",
            );
            if let Some(reason) = &next.error {
                if next.lifecycle == Lifecycle::Error {
                    tracing::warn!(error = %reason, "workload failed");
                }
            }
            let _ = self.transitions.send(Transition {
                workload_id: next.id.clone(),
                from: current.lifecycle,
                to: next.lifecycle,
                event: event.name(),
                at_ms: now,
            });
            // Deferred commands arrived before anything still waiting in replay
            while let Some(held) = self.deferred.pop_back() {
                self.replay.push_front(held);
            }
        }

        for effect in effects {
            if self.effects.send(effect).is_err() {
                tracing::debug!("effect worker gone, dropping effect");
            }
        }
    }
}

async fn run_effects(
    handler: Arc<dyn EffectHandler>,
    mut effects: mpsc::UnboundedReceiver<Effect>,
    inbox: mpsc::Sender<Event>,
    cancel: CancellationToken,
) {
    loop {
        let effect = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            effect = effects.recv() => match effect {
                Some(effect) => effect,
                None => break,
            },
        };

        let event = handler.execute(effect, &cancel).await;
        if cancel.is_cancelled() {
            break;
        }
        if let Some(event) = event {
            if inbox.send(event).await.is_err() {
                break;
            }
        }
    }

    effects.close();
    let mut dropped = 0usize;
    while effects.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        tracing::debug!(dropped, "discarded pending effects on halt");
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
