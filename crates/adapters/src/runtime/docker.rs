// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker CLI runtime.
//!
//! Every operation shells out to the `docker` binary. Commands are killed
//! when their future is dropped, so cancellation and timeouts do not leak
//! child processes.

use super::{BuildRequest, ContainerRuntime, ContainerState, ContainerStatus, RuntimeError};
use async_trait::async_trait;
use berth_core::{ContainerId, ContainerSpec, ImageId};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const STATUS_FORMAT: &str = "{{.State.Status}} {{.State.ExitCode}}";
const IP_FORMAT: &str = "{{range .NetworkSettings.Networks}}{{.IPAddress}} {{end}}";

/// Stderr lines kept in a build failure message.
const BUILD_ERROR_LINES: usize = 20;

/// Runtime backed by the Docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }

    async fn exec(&self, args: &[&str], cancel: &CancellationToken) -> Result<Output, RuntimeError> {
        let mut command = tokio::process::Command::new(&self.binary);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RuntimeError::Cancelled),
            output = command.output() => output.map_err(|e| {
                RuntimeError::Exec(format!("{}: {e}", self.binary.display()))
            }),
        }
    }

    /// Run a command and return trimmed stdout, mapping failures to errors.
    async fn run_docker(&self, args: &[&str], cancel: &CancellationToken) -> Result<String, RuntimeError> {
        let output = self.exec(args, cancel).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(command_error(args, &output.stderr))
        }
    }
}

fn command_error(args: &[&str], stderr: &[u8]) -> RuntimeError {
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();
    let target = args.last().copied().unwrap_or_default();
    if stderr.contains("No such container") || stderr.contains("No such object") {
        return RuntimeError::NotFound(target.to_string());
    }
    RuntimeError::CommandFailed {
        command: format!("docker {}", args.first().copied().unwrap_or_default()),
        stderr,
    }
}

/// Parse `inspect` output in [`STATUS_FORMAT`].
pub(crate) fn parse_status(raw: &str) -> Result<ContainerStatus, RuntimeError> {
    let mut parts = raw.split_whitespace();
    let state = parts.next().ok_or_else(|| RuntimeError::Parse(format!("empty status {raw:?}")))?;
    let exit_code = match parts.next() {
        Some(code) => Some(
            code.parse::<i32>()
                .map_err(|_| RuntimeError::Parse(format!("bad exit code in {raw:?}")))?,
        ),
        None => None,
    };
    Ok(ContainerStatus { state: ContainerState::parse(state), exit_code })
}

/// First address in [`IP_FORMAT`] output.
pub(crate) fn parse_ip(raw: &str) -> Result<IpAddr, RuntimeError> {
    raw.split_whitespace()
        .find_map(|addr| addr.parse::<IpAddr>().ok())
        .ok_or_else(|| RuntimeError::Parse(format!("no container address in {raw:?}")))
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn build(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> Result<ImageId, RuntimeError> {
        let iid_file = request.iid_file.display().to_string();
        let dockerfile = request.dockerfile.display().to_string();
        let context = request.context_dir.display().to_string();
        let args: [&str; 8] = [
            "build",
            "--iidfile",
            &iid_file,
            "-t",
            &request.tag,
            "-f",
            &dockerfile,
            &context,
        ];

        let _ = tokio::fs::remove_file(&request.iid_file).await;
        let output = self.exec(&args, cancel).await?;

        let mut log = output.stdout.clone();
        log.extend_from_slice(&output.stderr);
        if let Err(e) = tokio::fs::write(&request.log_file, &log).await {
            tracing::warn!(
                workload = %request.workload_id,
                path = %request.log_file.display(),
                error = %e,
                "failed to write build log",
            );
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RuntimeError::CommandFailed {
                command: "docker build".to_string(),
                stderr: tail_lines(stderr.trim(), BUILD_ERROR_LINES),
            });
        }

        let iid = tokio::fs::read_to_string(&request.iid_file)
            .await
            .map_err(|e| RuntimeError::Parse(format!("read {iid_file}: {e}")))?;
        let iid = iid.trim();
        if iid.is_empty() {
            return Err(RuntimeError::Parse(format!("{iid_file} is empty")));
        }
        Ok(ImageId::new(iid))
    }

    async fn start(
        &self,
        spec: &ContainerSpec,
        cancel: &CancellationToken,
    ) -> Result<ContainerId, RuntimeError> {
        // A crashed predecessor keeps the name reserved until removed
        match self.run_docker(&["rm", "-f", spec.name.as_str()], cancel).await {
            Ok(_) | Err(RuntimeError::NotFound(_)) => {}
            Err(RuntimeError::Cancelled) => return Err(RuntimeError::Cancelled),
            Err(e) => tracing::debug!(name = %spec.name, error = %e, "stale container removal failed"),
        }

        let run_args = spec.run_args();
        let mut args: Vec<&str> = vec!["run", "-d"];
        args.extend(run_args.iter().map(String::as_str));

        let id = self.run_docker(&args, cancel).await?;
        if id.is_empty() {
            return Err(RuntimeError::Parse("docker run printed no container id".to_string()));
        }
        Ok(ContainerId::new(id))
    }

    async fn stop(
        &self,
        container_id: &ContainerId,
        grace: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let secs = grace.as_secs().to_string();
        match self.run_docker(&["stop", "-t", &secs, container_id.as_str()], cancel).await {
            Ok(_) | Err(RuntimeError::NotFound(_)) => {}
            Err(RuntimeError::Cancelled) => {
                tracing::info!(container = %container_id.short(12), "stop cancelled, forcing removal");
            }
            Err(e) => {
                tracing::warn!(container = %container_id.short(12), error = %e, "graceful stop failed");
            }
        }

        // Removal is not cancellable
        match self.run_docker(&["rm", "-f", container_id.as_str()], &CancellationToken::new()).await {
            Ok(_) | Err(RuntimeError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn status(&self, container_id: &ContainerId) -> Result<ContainerStatus, RuntimeError> {
        let raw = self
            .run_docker(&["inspect", "-f", STATUS_FORMAT, container_id.as_str()], &CancellationToken::new())
            .await?;
        parse_status(&raw)
    }

    async fn inspect_ip(&self, container_id: &ContainerId) -> Result<IpAddr, RuntimeError> {
        let raw = self
            .run_docker(&["inspect", "-f", IP_FORMAT, container_id.as_str()], &CancellationToken::new())
            .await?;
        parse_ip(&raw)
    }

    async fn logs_tail(&self, container_id: &ContainerId, lines: usize) -> Result<String, RuntimeError> {
        let lines = lines.to_string();
        let args: [&str; 5] = ["logs", "--tail", &lines, "--timestamps", container_id.as_str()];
        let output = self.exec(&args, &CancellationToken::new()).await?;
        if !output.status.success() {
            return Err(command_error(&args, &output.stderr));
        }
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
