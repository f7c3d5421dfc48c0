// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::executor::FakeEffectHandler;
use crate::ports::{PortAllocator, PortProbe, PortRange};
use crate::registry::Registration;
use crate::supervisor::SupervisorConfig;
use berth_core::{BuildFingerprint, ContainerId, Effect, FakeClock, UserId, WorkloadId, WorkloadMetadata};

struct Harness {
    registry: Arc<Registry<FakeClock>>,
    handler: FakeEffectHandler,
}

fn setup() -> Harness {
    let probe: PortProbe = Arc::new(|_| true);
    let ports = PortAllocator::with_probe(PortRange::new(20000, 20009), probe).unwrap();
    let handler = FakeEffectHandler::new();
    let registry = Arc::new(Registry::new(
        ports,
        Arc::new(handler.clone()),
        FakeClock::new(),
        SupervisorConfig::default(),
    ));
    Harness { registry, handler }
}

fn register(h: &Harness, suffix: &str) -> WorkloadMetadata {
    let user = UserId::new("u1");
    let fingerprint = BuildFingerprint::new("build-0123456789ab");
    h.registry
        .register(Registration {
            id: WorkloadId::derive(&user, &fingerprint, suffix),
            fingerprint,
            user_id: user,
        })
        .unwrap()
}

async fn start_to_ready(h: &Harness, meta: &WorkloadMetadata) {
    let supervisor = h.registry.get_supervisor(&meta.id).unwrap();
    supervisor.send_event(Event::UserStartRequested { publish_port: meta.publish_port }).unwrap();
    tokio::time::timeout(Duration::from_secs(5), supervisor.wait_for(|s| s.lifecycle == Lifecycle::Ready))
        .await
        .unwrap()
        .unwrap();
}

fn probes(h: &Harness) -> usize {
    h.handler.executed().iter().filter(|e| matches!(e, Effect::FetchStatus { .. })).count()
}

#[tokio::test]
async fn tick_probes_only_running_workloads() {
    let h = setup();
    let ready = register(&h, "aaaaaaaa");
    register(&h, "bbbbbbbb");
    start_to_ready(&h, &ready).await;

    let monitor = HealthMonitor::new(Arc::clone(&h.registry), DEFAULT_HEALTH_INTERVAL);
    assert_eq!(monitor.tick(), 1);
    h.handler.wait_for_executed(4).await;
    assert_eq!(probes(&h), 1);
}

#[tokio::test]
async fn tick_with_no_workloads_sends_nothing() {
    let h = setup();
    let monitor = HealthMonitor::new(Arc::clone(&h.registry), DEFAULT_HEALTH_INTERVAL);
    assert_eq!(monitor.tick(), 0);
}

#[tokio::test]
async fn exited_container_is_detected_by_monitor() {
    let h = setup();
    let meta = register(&h, "aaaaaaaa");
    start_to_ready(&h, &meta).await;
    h.handler.set_exited(1);

    let cancel = CancellationToken::new();
    let task = HealthMonitor::new(Arc::clone(&h.registry), Duration::from_millis(10)).spawn(cancel.clone());

    let supervisor = h.registry.get_supervisor(&meta.id).unwrap();
    let state = tokio::time::timeout(Duration::from_secs(5), supervisor.wait_for(|s| s.lifecycle == Lifecycle::Error))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.error.as_deref(), Some("exited code=1"));

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn starting_workload_is_sent_a_check_that_never_runs() {
    let h = setup();
    let meta = register(&h, "aaaaaaaa");
    let supervisor = h.registry.get_supervisor(&meta.id).unwrap();
    h.handler.hold("start_container");
    supervisor.send_event(Event::UserStartRequested { publish_port: meta.publish_port }).unwrap();
    tokio::time::timeout(Duration::from_secs(5), supervisor.wait_for(|s| s.lifecycle == Lifecycle::Starting))
        .await
        .unwrap()
        .unwrap();

    let monitor = HealthMonitor::new(Arc::clone(&h.registry), DEFAULT_HEALTH_INTERVAL);
    assert_eq!(monitor.tick(), 1);

    supervisor.send_event(Event::ContainerStarted { container_id: ContainerId::new("c1") }).unwrap();
    supervisor.send_event(Event::UserStopRequested).unwrap();
    tokio::time::timeout(Duration::from_secs(5), supervisor.wait_for(|s| s.lifecycle == Lifecycle::Stopped))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(probes(&h), 0);
}
