// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Idempotent start and readiness of a single named container.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::readiness::{ReadinessConfig, ReadinessWaiter};
use crate::runtime::{ContainerRuntime, RuntimeState};
use crate::spec::{ComponentSpec, TargetHost};

/// What `start` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A container with this name was already running and was kept.
    Reused,
    /// A new container was created.
    Created {
        /// Runtime container id.
        container_id: String,
    },
}

impl StartOutcome {
    /// Whether the container was freshly created.
    pub fn is_created(&self) -> bool {
        matches!(self, StartOutcome::Created { .. })
    }
}

/// Facts about a ready container.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeInfo {
    /// Container name.
    pub name: String,
    /// Runtime id, when the container was created in this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    /// Container address on the runtime network.
    pub address: IpAddr,
    /// True if an already running container was reused.
    pub reused: bool,
    /// When readiness was confirmed.
    pub ready_at: DateTime<Utc>,
}

impl RuntimeInfo {
    /// Record the result of `start` for a container now known to be usable.
    pub fn from_outcome(name: impl Into<String>, outcome: StartOutcome, address: IpAddr) -> Self {
        let (container_id, reused) = match outcome {
            StartOutcome::Reused => (None, true),
            StartOutcome::Created { container_id } => (Some(container_id), false),
        };
        Self {
            name: name.into(),
            container_id,
            address,
            reused,
            ready_at: Utc::now(),
        }
    }
}

/// Starts containers and waits for them to become ready.
pub struct ContainerHandle {
    runtime: Arc<dyn ContainerRuntime>,
    waiter: ReadinessWaiter,
}

impl ContainerHandle {
    /// Create a handle over `runtime`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, readiness: ReadinessConfig) -> Self {
        let waiter = ReadinessWaiter::new(runtime.clone(), readiness);
        Self { runtime, waiter }
    }

    /// Ensure a container named `spec.name` exists and has been started.
    ///
    /// A running container is reused as is. A stopped leftover is removed
    /// and replaced.
    pub async fn start(&self, spec: &ComponentSpec) -> Result<StartOutcome> {
        let start_error = |source| Error::ContainerStart {
            name: spec.name.clone(),
            source,
        };

        let state = self
            .runtime
            .inspect_state(&spec.name)
            .await
            .map_err(start_error)?;
        if state == RuntimeState::Running {
            info!(container = %spec.name, "Reusing running container");
            return Ok(StartOutcome::Reused);
        }

        if state == RuntimeState::Stopped {
            info!(container = %spec.name, "Removing stopped container");
        }
        self.runtime
            .remove(&spec.name, true)
            .await
            .map_err(start_error)?;

        let container_id = self.runtime.run(spec).await.map_err(start_error)?;
        Ok(StartOutcome::Created { container_id })
    }

    /// Wait for `spec` to be running and for its readiness socket to open.
    ///
    /// Returns the container's address on the runtime network.
    pub async fn await_ready(&self, spec: &ComponentSpec) -> Result<IpAddr> {
        let config = *self.waiter.config();
        let state = self
            .waiter
            .wait_for_state(&spec.name, RuntimeState::Running, None)
            .await?;
        if !state.is_ready() {
            return Err(Error::StateTimeout {
                name: spec.name.clone(),
                state: RuntimeState::Running,
                timeout: config.state_timeout,
            });
        }

        let address = self.runtime.inspect_ip(&spec.name).await?;

        if let Some(target) = &spec.readiness {
            let host = match target.host {
                TargetHost::ContainerIp => address,
                TargetHost::Fixed(ip) => ip,
            };
            let socket = self.waiter.wait_for_socket(host, target.port, None).await;
            if !socket.is_ready() {
                return Err(Error::SocketTimeout {
                    target: format!("{}:{}", host, target.port),
                    timeout: config.socket_timeout,
                });
            }
        }

        info!(container = %spec.name, %address, "Container ready");
        Ok(address)
    }

    /// Finish bringing up a container after `start`.
    ///
    /// A reused container is returned as is, with only its address looked
    /// up. A created one goes through `await_ready`.
    pub async fn confirm(
        &self,
        spec: &ComponentSpec,
        outcome: StartOutcome,
    ) -> Result<RuntimeInfo> {
        let address = match outcome {
            StartOutcome::Reused => self.runtime.inspect_ip(&spec.name).await?,
            StartOutcome::Created { .. } => self.await_ready(spec).await?,
        };
        Ok(RuntimeInfo::from_outcome(&spec.name, outcome, address))
    }

    /// Start `spec` and wait until it is ready.
    pub async fn run(&self, spec: &ComponentSpec) -> Result<RuntimeInfo> {
        let outcome = self.start(spec).await?;
        self.confirm(spec, outcome).await
    }
}
