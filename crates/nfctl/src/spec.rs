// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fully resolved description of one container launch.
//!
//! A [`ComponentSpec`] is what the orchestrator hands to the container
//! handle: every placeholder has been rendered and every dependency address
//! has been looked up. It is not modified after construction.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Transport protocol of a published port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// TCP (default).
    #[default]
    Tcp,
    /// UDP.
    Udp,
    /// SCTP.
    Sctp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Sctp => write!(f, "sctp"),
        }
    }
}

/// A container port published on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Port on the host.
    pub host_port: u16,
    /// Port inside the container.
    pub container_port: u16,
    /// Transport protocol.
    pub protocol: Protocol,
}

impl PortBinding {
    /// Publish a TCP port under the same number on host and container.
    pub fn tcp(port: u16) -> Self {
        Self {
            host_port: port,
            container_port: port,
            protocol: Protocol::Tcp,
        }
    }

    /// Publish a port with an explicit protocol.
    pub fn new(host_port: u16, container_port: u16, protocol: Protocol) -> Self {
        Self {
            host_port,
            container_port,
            protocol,
        }
    }

    /// Render as `HOST:CONTAINER/PROTO`, the form runtimes accept for `-p`.
    pub fn to_publish_arg(&self) -> String {
        format!("{}:{}/{}", self.host_port, self.container_port, self.protocol)
    }
}

/// Extra runtime flags: privilege, capabilities, devices, realtime quota.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeFlags {
    /// Run the container privileged.
    pub privileged: bool,
    /// Linux capabilities to add.
    pub cap_add: Vec<String>,
    /// Host devices to bind into the container.
    pub devices: Vec<String>,
    /// Realtime CPU runtime quota in microseconds.
    pub cpu_rt_runtime: Option<u64>,
}

/// Host part of a readiness target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetHost {
    /// Probe the container's own runtime address, looked up after start.
    ContainerIp,
    /// Probe a fixed address.
    Fixed(IpAddr),
}

/// Socket that must accept connections before a container counts as ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessTarget {
    /// Host to connect to.
    pub host: TargetHost,
    /// TCP port to connect to.
    pub port: u16,
}

impl ReadinessTarget {
    /// Probe `port` on the container's own address.
    pub fn container_port(port: u16) -> Self {
        Self {
            host: TargetHost::ContainerIp,
            port,
        }
    }
}

/// Resolved launch description for one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Image reference.
    pub image: String,
    /// Container name; unique key in the runtime namespace.
    pub name: String,
    /// Environment variables. Keys are unique by construction.
    pub env: BTreeMap<String, String>,
    /// Published ports.
    pub ports: Vec<PortBinding>,
    /// Extra runtime flags.
    pub flags: RuntimeFlags,
    /// Optional socket readiness target.
    pub readiness: Option<ReadinessTarget>,
}

impl ComponentSpec {
    /// Create a spec with no env, ports, flags or readiness target.
    pub fn new(image: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            name: name.into(),
            env: BTreeMap::new(),
            ports: Vec::new(),
            flags: RuntimeFlags::default(),
            readiness: None,
        }
    }

    /// Add an environment variable, replacing any previous value.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add a published port.
    pub fn with_port(mut self, port: PortBinding) -> Self {
        self.ports.push(port);
        self
    }

    /// Replace the runtime flags.
    pub fn with_flags(mut self, flags: RuntimeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the readiness target.
    pub fn with_readiness(mut self, target: ReadinessTarget) -> Self {
        self.readiness = Some(target);
        self
    }
}
