// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::executor::FakeEffectHandler;
use crate::ports::{PortProbe, PortRange};
use berth_core::{Event, FakeClock};
use std::time::Duration;

fn registry(min: u16, max: u16) -> Registry<FakeClock> {
    let probe: PortProbe = Arc::new(|_| true);
    let ports = PortAllocator::with_probe(PortRange::new(min, max), probe).unwrap();
    Registry::new(ports, Arc::new(FakeEffectHandler::new()), FakeClock::new(), SupervisorConfig::default())
}

fn registration(suffix: &str) -> Registration {
    let user = UserId::new("u1");
    let fingerprint = BuildFingerprint::new("build-0123456789ab");
    Registration { id: WorkloadId::derive(&user, &fingerprint, suffix), fingerprint, user_id: user }
}

#[tokio::test]
async fn register_allocates_port_and_starts_in_created() {
    let reg = registry(20000, 20009);
    let meta = reg.register(registration("aaaaaaaa")).unwrap();

    assert_eq!(meta.publish_port, 20000);
    assert!(reg.ports().is_held(20000));
    assert!(reg.exists(&meta.id));
    let (_, state) = reg.snapshot(&meta.id).unwrap();
    assert_eq!(state.lifecycle, Lifecycle::Created);
    assert_eq!(state.publish_port, 20000);
}

#[tokio::test]
async fn duplicate_id_is_rejected_without_taking_a_port() {
    let reg = registry(20000, 20009);
    let meta = reg.register(registration("aaaaaaaa")).unwrap();
    assert_eq!(
        reg.register(registration("aaaaaaaa")),
        Err(RegistryError::AlreadyExists(meta.id))
    );
    assert_eq!(reg.ports().held_count(), 1);
    assert_eq!(reg.len(), 1);
}

#[tokio::test]
async fn exhausted_ports_leave_no_entry() {
    let reg = registry(20000, 20000);
    reg.register(registration("aaaaaaaa")).unwrap();
    let err = reg.register(registration("bbbbbbbb")).unwrap_err();
    assert_eq!(err, RegistryError::Ports(PortError::Exhausted { min: 20000, max: 20000 }));
    assert_eq!(reg.len(), 1);
}

#[tokio::test]
async fn purge_releases_port_for_reuse() {
    let reg = registry(20000, 20000);
    let first = reg.register(registration("aaaaaaaa")).unwrap();

    let purged = reg.purge(&first.id).await.unwrap();
    assert_eq!(purged.metadata, first);
    assert_eq!(purged.final_state.lifecycle, Lifecycle::Created);
    assert!(!reg.exists(&first.id));
    assert!(!reg.ports().is_held(20000));

    let second = reg.register(registration("bbbbbbbb")).unwrap();
    assert_eq!(second.publish_port, 20000);
}

#[tokio::test]
async fn purge_twice_is_not_found() {
    let reg = registry(20000, 20009);
    let meta = reg.register(registration("aaaaaaaa")).unwrap();
    reg.purge(&meta.id).await.unwrap();
    assert_eq!(reg.purge(&meta.id).await.unwrap_err(), RegistryError::NotFound(meta.id));
}

#[tokio::test]
async fn purged_supervisor_rejects_events() {
    let reg = registry(20000, 20009);
    let meta = reg.register(registration("aaaaaaaa")).unwrap();
    let supervisor = reg.get_supervisor(&meta.id).unwrap();
    reg.purge(&meta.id).await.unwrap();
    assert!(supervisor.send_event(Event::UserStopRequested).is_err());
}

#[tokio::test]
async fn list_is_ordered_by_creation() {
    let reg = registry(20000, 20009);
    let clock = reg.clock().clone();
    let b = reg.register(registration("bbbbbbbb")).unwrap();
    clock.advance(Duration::from_secs(1));
    let a = reg.register(registration("aaaaaaaa")).unwrap();

    let ids: Vec<WorkloadId> = reg.list().into_iter().map(|(m, _)| m.id).collect();
    assert_eq!(ids, vec![b.id, a.id]);
}

#[tokio::test]
async fn range_by_state_visits_matching_workloads() {
    let reg = registry(20000, 20009);
    let a = reg.register(registration("aaaaaaaa")).unwrap();
    let b = reg.register(registration("bbbbbbbb")).unwrap();

    let supervisor = reg.get_supervisor(&a.id).unwrap();
    supervisor.send_event(Event::UserStartRequested { publish_port: a.publish_port }).unwrap();
    tokio::time::timeout(Duration::from_secs(5), supervisor.wait_for(|s| s.lifecycle == Lifecycle::Ready))
        .await
        .unwrap()
        .unwrap();

    let mut ready = Vec::new();
    reg.range_by_state(Lifecycle::Ready, |meta, _| {
        ready.push(meta.id.clone());
        true
    });
    assert_eq!(ready, vec![a.id]);

    let mut created = Vec::new();
    reg.range_by_state(Lifecycle::Created, |meta, _| {
        created.push(meta.id.clone());
        true
    });
    assert_eq!(created, vec![b.id]);
}

#[tokio::test]
async fn range_by_state_stops_when_callback_returns_false() {
    let reg = registry(20000, 20009);
    reg.register(registration("aaaaaaaa")).unwrap();
    reg.register(registration("bbbbbbbb")).unwrap();

    let mut visits = 0;
    reg.range_by_state(Lifecycle::Created, |_, _| {
        visits += 1;
        false
    });
    assert_eq!(visits, 1);
}

#[tokio::test]
async fn purge_all_empties_registry() {
    let reg = registry(20000, 20009);
    reg.register(registration("aaaaaaaa")).unwrap();
    reg.register(registration("bbbbbbbb")).unwrap();
    assert_eq!(reg.purge_all().await.len(), 2);
    assert!(reg.is_empty());
    assert_eq!(reg.ports().held_count(), 0);
}
