// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container spec for running a workload, and the builder that enforces
//! its security contract.

use crate::id::WorkloadId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use thiserror::Error;

/// In-container control port every workload listens on.
pub const CONTROL_PORT: u16 = 8080;

/// Mount point of the workload's persistent state directory.
pub const STATE_MOUNT: &str = "/state";

pub const NO_NEW_PRIVILEGES: &str = "no-new-privileges:true";

/// gVisor.
pub const DEFAULT_RUNTIME: &str = "runsc";

pub const DEFAULT_NETWORK: &str = "bridge";

/// Environment variable carrying the workload id into the container.
pub const WORKLOAD_ID_ENV: &str = "BERTH_WORKLOAD_ID";

/// Container name for a workload.
pub fn container_name(id: &WorkloadId) -> String {
    format!("berth-{id}")
}

/// Image tag for a workload. Repository names must be lowercase.
pub fn image_tag(id: &WorkloadId) -> String {
    format!("berth/{}:latest", id.to_ascii_lowercase())
}

/// A host-to-container port publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub host_ip: IpAddr,
    pub host_port: u16,
    pub container_port: u16,
}

impl PortBinding {
    /// `127.0.0.1:<host_port>:8080`
    pub fn loopback(host_port: u16) -> Self {
        Self { host_ip: IpAddr::V4(Ipv4Addr::LOCALHOST), host_port, container_port: CONTROL_PORT }
    }
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host_ip {
            IpAddr::V4(ip) => write!(f, "{ip}:{}:{}", self.host_port, self.container_port),
            IpAddr::V6(ip) => write!(f, "[{ip}]:{}:{}", self.host_port, self.container_port),
        }
    }
}

/// A bind mount from the host into the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_write: bool,
}

impl fmt::Display for VolumeMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.read_write { "rw" } else { "ro" };
        write!(f, "{}:{}:{mode}", self.host_path.display(), self.container_path)
    }
}

/// Optional CPU and memory caps, passed through as `--cpus` / `--memory`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

/// Engine-facing description of how to run one workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub runtime: String,
    pub network: String,
    pub read_only_rootfs: bool,
    pub security_opts: Vec<String>,
    pub volumes: Vec<VolumeMount>,
    pub ports: Vec<PortBinding>,
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: ResourceLimits,
}

impl ContainerSpec {
    /// Arguments for `docker run -d`, image last.
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec![
            "--runtime".to_string(),
            self.runtime.clone(),
            "--name".to_string(),
            self.name.clone(),
            "--network".to_string(),
            self.network.clone(),
        ];
        if self.read_only_rootfs {
            args.push("--read-only".to_string());
        }
        for opt in &self.security_opts {
            args.push("--security-opt".to_string());
            args.push(opt.clone());
        }
        for volume in &self.volumes {
            args.push("-v".to_string());
            args.push(volume.to_string());
        }
        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{key}={value}"));
        }
        for port in &self.ports {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(cpus) = &self.resources.cpus {
            args.push("--cpus".to_string());
            args.push(cpus.clone());
        }
        if let Some(memory) = &self.resources.memory {
            args.push("--memory".to_string());
            args.push(memory.clone());
        }
        args.push(self.image.clone());
        args
    }
}

/// Security contract violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("image reference is empty")]
    MissingImage,
    #[error("expected exactly one port binding, found {0}")]
    PortBindingCount(usize),
    #[error("port binding {0} is not on 127.0.0.1")]
    NotLoopback(PortBinding),
    #[error("port binding {0} does not target container port {CONTROL_PORT}")]
    WrongContainerPort(PortBinding),
    #[error("port binding {0} has no host port")]
    MissingHostPort(PortBinding),
    #[error("root filesystem is writable")]
    WritableRootFs,
    #[error("security option {NO_NEW_PRIVILEGES} is missing")]
    MissingNoNewPrivileges,
    #[error("runtime {0:?} is not allowed")]
    RuntimeNotAllowed(String),
    #[error("no volume is mounted at {STATE_MOUNT}")]
    StateVolumeMissing,
    #[error("volume at {STATE_MOUNT} is read-only")]
    StateVolumeReadOnly,
}

/// Operator settings for workload containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    pub runtime: String,
    pub allowed_runtimes: Vec<String>,
    pub network: String,
    /// Extra environment for every workload container.
    pub env: BTreeMap<String, String>,
    pub resources: ResourceLimits,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            runtime: DEFAULT_RUNTIME.to_string(),
            allowed_runtimes: vec![DEFAULT_RUNTIME.to_string()],
            network: DEFAULT_NETWORK.to_string(),
            env: BTreeMap::new(),
            resources: ResourceLimits::default(),
        }
    }
}

/// Per-workload inputs to [`SpecBuilder::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRequest {
    pub workload_id: WorkloadId,
    pub image: String,
    pub state_dir: PathBuf,
    pub publish_port: u16,
}

/// Produces container specs from operator settings and validates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBuilder {
    settings: ContainerSettings,
    /// Bindings published in addition to the control port.
    extra_ports: Vec<PortBinding>,
    writable_rootfs: bool,
}

impl SpecBuilder {
    pub fn new(settings: ContainerSettings) -> Self {
        Self { settings, extra_ports: Vec::new(), writable_rootfs: false }
    }

    crate::setters! {
        set {
            extra_ports: Vec<PortBinding>,
            writable_rootfs: bool,
        }
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    pub fn build(&self, request: &SpecRequest) -> ContainerSpec {
        let mut env = self.settings.env.clone();
        env.insert(WORKLOAD_ID_ENV.to_string(), request.workload_id.to_string());

        let mut ports = vec![PortBinding::loopback(request.publish_port)];
        ports.extend(self.extra_ports.iter().copied());

        ContainerSpec {
            image: request.image.clone(),
            name: container_name(&request.workload_id),
            runtime: self.settings.runtime.clone(),
            network: self.settings.network.clone(),
            read_only_rootfs: !self.writable_rootfs,
            security_opts: vec![NO_NEW_PRIVILEGES.to_string()],
            volumes: vec![VolumeMount {
                host_path: request.state_dir.clone(),
                container_path: STATE_MOUNT.to_string(),
                read_write: true,
            }],
            ports,
            env,
            resources: self.settings.resources.clone(),
        }
    }

    /// Check `spec` against the security contract. Runs before any engine call.
    pub fn validate(&self, spec: &ContainerSpec) -> Result<(), SpecError> {
        if spec.image.trim().is_empty() {
            return Err(SpecError::MissingImage);
        }

        let binding = match spec.ports.as_slice() {
            [binding] => *binding,
            other => return Err(SpecError::PortBindingCount(other.len())),
        };
        if binding.host_ip != IpAddr::V4(Ipv4Addr::LOCALHOST) {
            return Err(SpecError::NotLoopback(binding));
        }
        if binding.container_port != CONTROL_PORT {
            return Err(SpecError::WrongContainerPort(binding));
        }
        if binding.host_port == 0 {
            return Err(SpecError::MissingHostPort(binding));
        }

        if !spec.read_only_rootfs {
            return Err(SpecError::WritableRootFs);
        }
        if !spec.security_opts.iter().any(|opt| opt == NO_NEW_PRIVILEGES) {
            return Err(SpecError::MissingNoNewPrivileges);
        }
        if !self.settings.allowed_runtimes.iter().any(|r| *r == spec.runtime) {
            return Err(SpecError::RuntimeNotAllowed(spec.runtime.clone()));
        }

        match spec.volumes.iter().find(|v| v.container_path == STATE_MOUNT) {
            None => Err(SpecError::StateVolumeMissing),
            Some(volume) if !volume.read_write => Err(SpecError::StateVolumeReadOnly),
            Some(_) => Ok(()),
        }
    }

    /// Build and validate in one step.
    pub fn build_validated(&self, request: &SpecRequest) -> Result<ContainerSpec, SpecError> {
        let spec = self.build(request);
        self.validate(&spec)?;
        Ok(spec)
    }
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
