// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Docker-compatible CLI runtime.
//!
//! Drives the `docker` CLI (or any CLI with the same verbs, such as `podman`)
//! through `tokio::process::Command`. State and addresses are read from the
//! JSON emitted by `inspect`.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::runtime::{ContainerRuntime, Result, RuntimeError, RuntimeState};
use crate::spec::ComponentSpec;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectRecord {
    state: InspectState,
    #[serde(default)]
    network_settings: Option<InspectNetworkSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetworkSettings {
    #[serde(rename = "IPAddress", default)]
    ip_address: Option<String>,
    #[serde(default)]
    networks: HashMap<String, InspectNetwork>,
}

#[derive(Debug, Deserialize)]
struct InspectNetwork {
    #[serde(rename = "IPAddress", default)]
    ip_address: Option<String>,
}

/// Whether runtime stderr reports a missing container.
fn is_not_found(stderr: &str) -> bool {
    stderr.to_ascii_lowercase().contains("no such")
}

/// Parse `inspect` output into the container's state.
fn parse_state(stdout: &[u8]) -> Result<RuntimeState> {
    let records: Vec<InspectRecord> = serde_json::from_slice(stdout)?;
    let record = records
        .first()
        .ok_or_else(|| RuntimeError::Parse("empty inspect output".to_string()))?;
    Ok(RuntimeState::from_status(&record.state.status))
}

/// Parse `inspect` output into the container's first non-empty IP address.
fn parse_ip(name: &str, stdout: &[u8]) -> Result<IpAddr> {
    let records: Vec<InspectRecord> = serde_json::from_slice(stdout)?;
    let settings = records
        .into_iter()
        .next()
        .and_then(|r| r.network_settings)
        .ok_or_else(|| RuntimeError::NoAddress(name.to_string()))?;

    // Networks are keyed by name; sort for a stable pick across runs
    let mut networks: Vec<_> = settings.networks.into_iter().collect();
    networks.sort_by(|a, b| a.0.cmp(&b.0));

    let candidate = settings
        .ip_address
        .into_iter()
        .chain(networks.into_iter().filter_map(|(_, n)| n.ip_address))
        .find(|ip| !ip.trim().is_empty())
        .ok_or_else(|| RuntimeError::NoAddress(name.to_string()))?;

    candidate
        .trim()
        .parse()
        .map_err(|_| RuntimeError::Parse(format!("invalid address for {}: {}", name, candidate)))
}

/// Build the argument list for a detached `run`.
pub fn run_args(spec: &ComponentSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--detach".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];
    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }
    for port in &spec.ports {
        args.push("--publish".to_string());
        args.push(port.to_publish_arg());
    }
    if spec.flags.privileged {
        args.push("--privileged".to_string());
    }
    for cap in &spec.flags.cap_add {
        args.push("--cap-add".to_string());
        args.push(cap.clone());
    }
    for device in &spec.flags.devices {
        args.push("--device".to_string());
        args.push(device.clone());
    }
    if let Some(quota) = spec.flags.cpu_rt_runtime {
        args.push(format!("--cpu-rt-runtime={}", quota));
    }
    args.push(spec.image.clone());
    args
}

/// Docker-compatible CLI runtime.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerRuntime {
    /// Create a runtime that shells out to `binary`.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn invoke(&self, args: &[String]) -> Result<std::process::Output> {
        debug!(binary = %self.binary, args = ?args, "Invoking container runtime");
        Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                binary: self.binary.clone(),
                source,
            })
    }

    fn command_error(&self, verb: &str, output: &std::process::Output) -> RuntimeError {
        RuntimeError::Command {
            command: format!("{} {}", self.binary, verb),
            exit_code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    async fn inspect(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let args = vec![
            "inspect".to_string(),
            "--type".to_string(),
            "container".to_string(),
            name.to_string(),
        ];
        let output = self.invoke(&args).await?;
        if output.status.success() {
            return Ok(Some(output.stdout));
        }
        if is_not_found(&String::from_utf8_lossy(&output.stderr)) {
            return Ok(None);
        }
        Err(self.command_error("inspect", &output))
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn runtime_type(&self) -> &'static str {
        "docker"
    }

    async fn inspect_state(&self, name: &str) -> Result<RuntimeState> {
        match self.inspect(name).await? {
            Some(stdout) => parse_state(&stdout),
            None => Ok(RuntimeState::Absent),
        }
    }

    async fn inspect_ip(&self, name: &str) -> Result<IpAddr> {
        let stdout = self
            .inspect(name)
            .await?
            .ok_or_else(|| RuntimeError::NotFound(name.to_string()))?;
        parse_ip(name, &stdout)
    }

    async fn remove(&self, name: &str, force: bool) -> Result<()> {
        let mut args = vec!["rm".to_string()];
        if force {
            args.push("--force".to_string());
        }
        args.push(name.to_string());

        let output = self.invoke(&args).await?;
        if output.status.success() {
            debug!(container = %name, "Removed container");
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if force && is_not_found(&stderr) {
            debug!(container = %name, "Nothing to remove");
            return Ok(());
        }
        Err(self.command_error("rm", &output))
    }

    async fn run(&self, spec: &ComponentSpec) -> Result<String> {
        let output = self.invoke(&run_args(spec)).await?;
        if !output.status.success() {
            return Err(self.command_error("run", &output));
        }
        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if container_id.is_empty() {
            warn!(container = %spec.name, "Runtime returned no container ID");
        }
        info!(
            container = %spec.name,
            image = %spec.image,
            container_id = %container_id,
            "Created container"
        );
        Ok(container_id)
    }

    async fn exec_one_shot(&self, image: &str, command: &[String]) -> Result<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string(), image.to_string()];
        args.extend(command.iter().cloned());

        let output = self.invoke(&args).await?;
        if !output.status.success() {
            return Err(self.command_error("run --rm", &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
