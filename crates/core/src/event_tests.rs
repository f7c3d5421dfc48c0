// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn serializes_with_type_tag() {
    let json = serde_json::to_value(Event::UserStartRequested { publish_port: 19001 }).unwrap();
    assert_eq!(json, serde_json::json!({"type": "user:start", "publish_port": 19001}));

    let parsed: Event = serde_json::from_str(r#"{"type":"container:started","container_id":"c1"}"#).unwrap();
    assert_eq!(parsed, Event::ContainerStarted { container_id: ContainerId::new("c1") });
}

#[test]
fn serde_tag_matches_name() {
    let events = [
        Event::UserStopRequested,
        Event::FoldersFailed { reason: "x".into() },
        Event::BuildFinished { image_id: ImageId::new("sha256:abc") },
        Event::StopFinished,
        Event::HealthExited { exit_code: 137 },
        Event::StatusProbe,
    ];
    for event in events {
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.name());
    }
}

#[parameterized(
    start = { Event::UserStartRequested { publish_port: 1 }, true },
    stop = { Event::UserStopRequested, true },
    restart = { Event::UserRestartRequested, true },
    probe = { Event::StatusProbe, false },
    stopped = { Event::StopFinished, false },
)]
fn user_commands(event: Event, expected: bool) {
    assert_eq!(event.is_user_command(), expected);
}

#[parameterized(
    folders = { Event::FoldersFailed { reason: "eacces".into() }, Some("ensure folders: eacces") },
    build = { Event::BuildFailed { reason: "no such file".into() }, Some("build: no such file") },
    exited = { Event::HealthExited { exit_code: -1 }, Some("exited code=-1") },
    success = { Event::FoldersEnsured, None },
)]
fn failure_reasons(event: Event, expected: Option<&str>) {
    assert_eq!(event.failure_reason().as_deref(), expected);
}

#[test]
fn log_summary_truncates_container_id() {
    let event = Event::ContainerStarted { container_id: ContainerId::new("0123456789abcdef0123") };
    assert_eq!(event.log_summary(), "container:started container=0123456789ab");
}
