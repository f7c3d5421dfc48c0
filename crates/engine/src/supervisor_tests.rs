// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::executor::FakeEffectHandler;
use berth_core::test_support::{workload_id, TEST_PORT};
use berth_core::{ContainerId, FakeClock, ImageId};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    supervisor: Arc<Supervisor>,
    handler: FakeEffectHandler,
    clock: FakeClock,
}

fn setup() -> Harness {
    let handler = FakeEffectHandler::new();
    let clock = FakeClock::new();
    let supervisor = Supervisor::spawn(
        WorkloadState::new(workload_id(1), TEST_PORT, clock.epoch_ms()),
        Arc::new(handler.clone()),
        clock.clone(),
        SupervisorConfig::default(),
    );
    Harness { supervisor, handler, clock }
}

async fn wait_lifecycle(supervisor: &Supervisor, lifecycle: Lifecycle) -> WorkloadState {
    tokio::time::timeout(WAIT, supervisor.wait_for(|s| s.lifecycle == lifecycle))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {lifecycle}, at {}", supervisor.state().lifecycle))
        .expect("supervisor halted")
}

async fn collect_until(rx: &mut broadcast::Receiver<Transition>, last: Lifecycle) -> Vec<(Lifecycle, Lifecycle)> {
    let mut seen = Vec::new();
    loop {
        let transition = tokio::time::timeout(WAIT, rx.recv()).await.expect("timed out").unwrap();
        seen.push((transition.from, transition.to));
        if transition.to == last {
            return seen;
        }
    }
}

fn start() -> Event {
    Event::UserStartRequested { publish_port: TEST_PORT }
}

#[tokio::test]
async fn start_runs_through_to_ready() {
    let h = setup();
    let mut transitions = h.supervisor.subscribe();
    h.supervisor.send_event(start()).unwrap();

    let state = wait_lifecycle(&h.supervisor, Lifecycle::Ready).await;
    assert_eq!(state.container_id, Some(ContainerId::new("c1")));
    assert_eq!(state.image_id, Some(ImageId::new("sha256:img1")));
    assert_eq!(
        collect_until(&mut transitions, Lifecycle::Ready).await,
        vec![
            (Lifecycle::Created, Lifecycle::Building),
            (Lifecycle::Building, Lifecycle::Starting),
            (Lifecycle::Starting, Lifecycle::Ready),
        ]
    );
    assert_eq!(h.handler.executed_names(), vec!["ensure_folders", "build_image", "start_container"]);
}

#[tokio::test]
async fn build_failure_lands_in_error() {
    let h = setup();
    h.handler.fail("build_image", "boom");
    h.supervisor.send_event(start()).unwrap();

    let state = wait_lifecycle(&h.supervisor, Lifecycle::Error).await;
    assert_eq!(state.error.as_deref(), Some("build: boom"));
    assert_eq!(state.container_id, None);
}

#[tokio::test]
async fn failed_workload_can_start_again() {
    let h = setup();
    h.handler.fail("start_container", "port taken");
    h.supervisor.send_event(start()).unwrap();
    wait_lifecycle(&h.supervisor, Lifecycle::Error).await;

    h.handler.clear_failures();
    h.supervisor.send_event(start()).unwrap();
    let state = wait_lifecycle(&h.supervisor, Lifecycle::Ready).await;
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn stop_from_ready_clears_container() {
    let h = setup();
    h.supervisor.send_event(start()).unwrap();
    wait_lifecycle(&h.supervisor, Lifecycle::Ready).await;

    h.supervisor.send_event(Event::UserStopRequested).unwrap();
    let state = wait_lifecycle(&h.supervisor, Lifecycle::Stopped).await;
    assert_eq!(state.container_id, None);
    assert!(matches!(h.handler.executed().last(), Some(Effect::StopContainer { .. })));
}

#[tokio::test]
async fn restart_stops_then_starts_with_new_container() {
    let h = setup();
    h.supervisor.send_event(start()).unwrap();
    wait_lifecycle(&h.supervisor, Lifecycle::Ready).await;
    let mut transitions = h.supervisor.subscribe();

    h.supervisor.send_event(Event::UserRestartRequested).unwrap();
    assert_eq!(
        collect_until(&mut transitions, Lifecycle::Ready).await,
        vec![
            (Lifecycle::Ready, Lifecycle::Stopping),
            (Lifecycle::Stopping, Lifecycle::Stopped),
            (Lifecycle::Stopped, Lifecycle::Building),
            (Lifecycle::Building, Lifecycle::Starting),
            (Lifecycle::Starting, Lifecycle::Ready),
        ]
    );
    let state = h.supervisor.state();
    assert_eq!(state.container_id, Some(ContainerId::new("c2")));
    assert!(!state.restart_pending);
}

#[tokio::test]
async fn stop_during_build_is_applied_after_ready() {
    let h = setup();
    h.handler.hold("build_image");
    let mut transitions = h.supervisor.subscribe();

    h.supervisor.send_event(start()).unwrap();
    wait_lifecycle(&h.supervisor, Lifecycle::Building).await;
    h.supervisor.send_event(Event::UserStopRequested).unwrap();
    h.supervisor
        .send_event(Event::BuildFinished { image_id: ImageId::new("sha256:manual") })
        .unwrap();

    assert_eq!(
        collect_until(&mut transitions, Lifecycle::Stopped).await,
        vec![
            (Lifecycle::Created, Lifecycle::Building),
            (Lifecycle::Building, Lifecycle::Starting),
            (Lifecycle::Starting, Lifecycle::Ready),
            (Lifecycle::Ready, Lifecycle::Stopping),
            (Lifecycle::Stopping, Lifecycle::Stopped),
        ]
    );
}

#[tokio::test]
async fn start_during_stopping_runs_after_stop_finishes() {
    let h = setup();
    h.supervisor.send_event(start()).unwrap();
    wait_lifecycle(&h.supervisor, Lifecycle::Ready).await;
    h.handler.hold("stop_container");
    let mut transitions = h.supervisor.subscribe();

    h.supervisor.send_event(Event::UserStopRequested).unwrap();
    wait_lifecycle(&h.supervisor, Lifecycle::Stopping).await;
    h.supervisor.send_event(start()).unwrap();
    h.handler.release("stop_container");
    h.supervisor.send_event(Event::StopFinished).unwrap();

    assert_eq!(
        collect_until(&mut transitions, Lifecycle::Ready).await,
        vec![
            (Lifecycle::Ready, Lifecycle::Stopping),
            (Lifecycle::Stopping, Lifecycle::Stopped),
            (Lifecycle::Stopped, Lifecycle::Building),
            (Lifecycle::Building, Lifecycle::Starting),
            (Lifecycle::Starting, Lifecycle::Ready),
        ]
    );
    assert_eq!(h.supervisor.state().container_id, Some(ContainerId::new("c2")));
}

#[tokio::test]
async fn stop_deferred_behind_failed_start_is_dropped() {
    let h = setup();
    h.handler.hold("start_container");
    let mut transitions = h.supervisor.subscribe();

    h.supervisor.send_event(start()).unwrap();
    wait_lifecycle(&h.supervisor, Lifecycle::Starting).await;
    h.supervisor.send_event(Event::UserStopRequested).unwrap();
    h.supervisor.send_event(Event::StartFailed { reason: "port taken".to_string() }).unwrap();

    let state = wait_lifecycle(&h.supervisor, Lifecycle::Error).await;
    assert_eq!(state.error.as_deref(), Some("start: port taken"));

    // Replayed commands run ahead of the inbox, so the stop is settled
    // before this start is reduced
    h.handler.release("start_container");
    h.supervisor.send_event(start()).unwrap();
    assert_eq!(
        collect_until(&mut transitions, Lifecycle::Ready).await,
        vec![
            (Lifecycle::Created, Lifecycle::Building),
            (Lifecycle::Building, Lifecycle::Starting),
            (Lifecycle::Starting, Lifecycle::Error),
            (Lifecycle::Error, Lifecycle::Building),
            (Lifecycle::Building, Lifecycle::Starting),
            (Lifecycle::Starting, Lifecycle::Ready),
        ]
    );
    assert!(!h.handler.executed_names().contains(&"stop_container"));
}

#[tokio::test]
async fn status_check_while_starting_is_inert() {
    let h = setup();
    h.handler.hold("start_container");
    h.supervisor.send_event(start()).unwrap();
    let starting = wait_lifecycle(&h.supervisor, Lifecycle::Starting).await;

    h.supervisor.send_event(Event::StatusProbe).unwrap();
    h.supervisor.send_event(Event::ContainerStarted { container_id: ContainerId::new("c1") }).unwrap();
    wait_lifecycle(&h.supervisor, Lifecycle::Ready).await;
    assert_eq!(starting.container_id, None);

    // Effects run in order, so once stopped every earlier effect has run
    h.supervisor.send_event(Event::StatusProbe).unwrap();
    h.supervisor.send_event(Event::UserStopRequested).unwrap();
    wait_lifecycle(&h.supervisor, Lifecycle::Stopped).await;
    assert_eq!(
        h.handler.executed_names(),
        vec!["ensure_folders", "build_image", "start_container", "fetch_status", "stop_container"]
    );
}

#[tokio::test]
async fn exited_container_moves_ready_to_error() {
    let h = setup();
    h.supervisor.send_event(start()).unwrap();
    wait_lifecycle(&h.supervisor, Lifecycle::Ready).await;

    h.handler.set_exited(137);
    h.supervisor.send_event(Event::StatusProbe).unwrap();
    let state = wait_lifecycle(&h.supervisor, Lifecycle::Error).await;
    assert_eq!(state.error.as_deref(), Some("exited code=137"));
}

#[tokio::test]
async fn probe_of_running_container_changes_nothing() {
    let h = setup();
    h.supervisor.send_event(start()).unwrap();
    let before = wait_lifecycle(&h.supervisor, Lifecycle::Ready).await;

    h.supervisor.send_event(Event::StatusProbe).unwrap();
    h.handler.wait_for_executed(4).await;
    assert_eq!(h.supervisor.state(), before);
}

#[tokio::test]
async fn inapplicable_event_is_dropped() {
    let h = setup();
    h.supervisor.send_event(Event::StopFinished).unwrap();
    h.supervisor.send_event(start()).unwrap();
    // The stray completion did not block the start behind it
    wait_lifecycle(&h.supervisor, Lifecycle::Ready).await;
}

#[tokio::test]
async fn transitions_are_stamped_with_clock_time() {
    let h = setup();
    h.clock.set_epoch_ms(5_000_000);
    h.supervisor.send_event(start()).unwrap();
    let state = wait_lifecycle(&h.supervisor, Lifecycle::Ready).await;
    assert_eq!(state.last_updated_ms, 5_000_000);
}

#[tokio::test]
async fn halt_is_idempotent_and_rejects_new_events() {
    let h = setup();
    h.supervisor.send_event(start()).unwrap();
    wait_lifecycle(&h.supervisor, Lifecycle::Ready).await;

    let final_state = h.supervisor.halt().await;
    assert_eq!(final_state.lifecycle, Lifecycle::Ready);
    assert_eq!(h.supervisor.halt().await, final_state);
    assert!(h.supervisor.is_halted());
    assert_eq!(
        h.supervisor.send_event(Event::UserStopRequested),
        Err(SupervisorError::Stopped(workload_id(1)))
    );
}

#[tokio::test]
async fn halt_cancels_inflight_effect() {
    let h = setup();
    h.handler.hold("build_image");
    h.supervisor.send_event(start()).unwrap();
    wait_lifecycle(&h.supervisor, Lifecycle::Building).await;

    let final_state = tokio::time::timeout(WAIT, h.supervisor.halt()).await.unwrap();
    assert_eq!(final_state.lifecycle, Lifecycle::Building);
    assert!(h.supervisor.wait_for(|s| s.lifecycle == Lifecycle::Ready).await.is_none());
}

#[tokio::test]
async fn full_inbox_is_reported() {
    let handler = FakeEffectHandler::new();
    let supervisor = Supervisor::spawn(
        WorkloadState::new(workload_id(2), TEST_PORT, 0),
        Arc::new(handler),
        FakeClock::new(),
        SupervisorConfig { inbox_capacity: 1 },
    );
    // Without yielding, the reduce loop cannot drain between sends
    supervisor.send_event(Event::StatusProbe).unwrap();
    assert_eq!(
        supervisor.send_event(Event::StatusProbe),
        Err(SupervisorError::InboxFull(workload_id(2)))
    );
}
