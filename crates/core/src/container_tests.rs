// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use std::net::Ipv6Addr;
use yare::parameterized;

fn request(port: u16) -> SpecRequest {
    SpecRequest {
        workload_id: WorkloadId::new("u1-build-0123456789ab-abcd1234"),
        image: "berth/u1-build-0123456789ab-abcd1234:latest".to_string(),
        state_dir: PathBuf::from("/var/lib/berth/workloads/w/state"),
        publish_port: port,
    }
}

fn builder() -> SpecBuilder {
    SpecBuilder::new(ContainerSettings::default())
}

#[test]
fn build_produces_hardened_spec() {
    let spec = builder().build(&request(19001));

    assert_eq!(spec.name, "berth-u1-build-0123456789ab-abcd1234");
    assert_eq!(spec.runtime, "runsc");
    assert_eq!(spec.network, "bridge");
    assert!(spec.read_only_rootfs);
    assert_eq!(spec.security_opts, vec!["no-new-privileges:true"]);
    assert_eq!(spec.ports, vec![PortBinding::loopback(19001)]);
    assert_eq!(spec.ports[0].to_string(), "127.0.0.1:19001:8080");
    assert_eq!(spec.volumes.len(), 1);
    assert_eq!(spec.volumes[0].to_string(), "/var/lib/berth/workloads/w/state:/state:rw");
    assert_eq!(spec.env.get(WORKLOAD_ID_ENV).map(String::as_str), Some("u1-build-0123456789ab-abcd1234"));
    assert_eq!(builder().validate(&spec), Ok(()));
}

#[test]
fn workload_id_env_overrides_operator_env() {
    let mut settings = ContainerSettings::default();
    settings.env.insert("TZ".into(), "UTC".into());
    settings.env.insert(WORKLOAD_ID_ENV.into(), "spoofed".into());
    let spec = SpecBuilder::new(settings).build(&request(19001));
    assert_eq!(spec.env["TZ"], "UTC");
    assert_eq!(spec.env[WORKLOAD_ID_ENV], "u1-build-0123456789ab-abcd1234");
}

#[test]
fn run_args_translate_binding_literally() {
    let mut settings = ContainerSettings::default();
    settings.resources.memory = Some("256m".into());
    let args = SpecBuilder::new(settings).build(&request(19007)).run_args();

    let joined = args.join(" ");
    assert!(joined.contains("--runtime runsc"));
    assert!(joined.contains("--read-only"));
    assert!(joined.contains("--security-opt no-new-privileges:true"));
    assert!(joined.contains("-p 127.0.0.1:19007:8080"));
    assert!(joined.contains("-v /var/lib/berth/workloads/w/state:/state:rw"));
    assert!(joined.contains("--memory 256m"));
    assert!(!joined.contains("--cpus"));
    assert_eq!(args.last().map(String::as_str), Some("berth/u1-build-0123456789ab-abcd1234:latest"));
}

#[test]
fn image_tag_is_lowercase() {
    assert_eq!(image_tag(&WorkloadId::new("Team-build-0a-XY")), "berth/team-build-0a-xy:latest");
}

#[test]
fn second_port_binding_is_rejected() {
    let b = builder().extra_ports(vec![PortBinding::loopback(19002)]);
    assert_eq!(b.build_validated(&request(19001)), Err(SpecError::PortBindingCount(2)));
}

#[test]
fn writable_rootfs_is_rejected() {
    let b = builder().writable_rootfs(true);
    assert_eq!(b.build_validated(&request(19001)), Err(SpecError::WritableRootFs));
}

#[test]
fn runtime_outside_allow_list_is_rejected() {
    let settings = ContainerSettings { runtime: "runc".into(), ..ContainerSettings::default() };
    assert_eq!(
        SpecBuilder::new(settings).build_validated(&request(19001)),
        Err(SpecError::RuntimeNotAllowed("runc".into()))
    );
}

#[test]
fn allow_list_can_admit_other_runtimes() {
    let settings = ContainerSettings {
        runtime: "runc".into(),
        allowed_runtimes: vec!["runsc".into(), "runc".into()],
        ..ContainerSettings::default()
    };
    assert!(SpecBuilder::new(settings).build_validated(&request(19001)).is_ok());
}

fn tampered(edit: impl FnOnce(&mut ContainerSpec)) -> Result<(), SpecError> {
    let mut spec = builder().build(&request(19001));
    edit(&mut spec);
    builder().validate(&spec)
}

#[parameterized(
    no_ports = { |s: &mut ContainerSpec| s.ports.clear(), SpecError::PortBindingCount(0) },
    all_interfaces = {
        |s: &mut ContainerSpec| s.ports[0].host_ip = IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SpecError::NotLoopback(PortBinding { host_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED), host_port: 19001, container_port: 8080 })
    },
    ipv6_loopback = {
        |s: &mut ContainerSpec| s.ports[0].host_ip = IpAddr::V6(Ipv6Addr::LOCALHOST),
        SpecError::NotLoopback(PortBinding { host_ip: IpAddr::V6(Ipv6Addr::LOCALHOST), host_port: 19001, container_port: 8080 })
    },
    wrong_container_port = {
        |s: &mut ContainerSpec| s.ports[0].container_port = 80,
        SpecError::WrongContainerPort(PortBinding { host_ip: IpAddr::V4(Ipv4Addr::LOCALHOST), host_port: 19001, container_port: 80 })
    },
    no_state_volume = { |s: &mut ContainerSpec| s.volumes.clear(), SpecError::StateVolumeMissing },
    read_only_state = { |s: &mut ContainerSpec| s.volumes[0].read_write = false, SpecError::StateVolumeReadOnly },
    no_security_opt = { |s: &mut ContainerSpec| s.security_opts.clear(), SpecError::MissingNoNewPrivileges },
    empty_image = { |s: &mut ContainerSpec| s.image.clear(), SpecError::MissingImage },
)]
fn tampered_specs_fail_validation(edit: fn(&mut ContainerSpec), expected: SpecError) {
    assert_eq!(tampered(edit), Err(expected));
}

#[test]
fn ipv6_binding_display_uses_brackets() {
    let binding = PortBinding { host_ip: IpAddr::V6(Ipv6Addr::LOCALHOST), host_port: 1, container_port: 8080 };
    assert_eq!(binding.to_string(), "[::1]:1:8080");
}

proptest! {
    #[test]
    fn built_specs_satisfy_contract(port in 1u16.., suffix in "[a-z0-9]{8}") {
        let mut req = request(port);
        req.workload_id = WorkloadId::new(format!("u1-build-0123456789ab-{suffix}"));
        let b = builder();
        let spec = b.build(&req);

        prop_assert_eq!(spec.ports.len(), 1);
        prop_assert_eq!(spec.ports[0].to_string(), format!("127.0.0.1:{port}:8080"));
        prop_assert!(spec.read_only_rootfs);
        prop_assert!(spec.volumes.iter().any(|v| v.container_path == STATE_MOUNT && v.read_write));
        prop_assert!(b.settings().allowed_runtimes.contains(&spec.runtime));
        prop_assert_eq!(b.validate(&spec), Ok(()));
    }
}
