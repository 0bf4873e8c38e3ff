// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock runtime for testing.
//!
//! An in-memory runtime that simulates container state without touching a
//! real container engine. Every call is recorded so tests can assert which
//! mutations were issued.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::traits::*;
use crate::spec::ComponentSpec;

/// A recorded runtime call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    /// `inspect_state(name)`
    InspectState(String),
    /// `inspect_ip(name)`
    InspectIp(String),
    /// `remove(name, force)`
    Remove(String),
    /// `run(spec)`, recorded by container name.
    Run(String),
    /// `exec_one_shot(image, command)`, recorded with the joined command.
    Exec {
        /// Image used.
        image: String,
        /// Command line joined with spaces.
        command: String,
    },
}

impl RuntimeCall {
    /// Whether this call changes the runtime's container namespace.
    pub fn is_mutation(&self) -> bool {
        matches!(self, RuntimeCall::Remove(_) | RuntimeCall::Run(_))
    }
}

#[derive(Debug, Clone)]
struct MockContainer {
    state: RuntimeState,
    ip: IpAddr,
    spec: Option<ComponentSpec>,
    /// Number of remaining state polls before a fresh container reports running.
    pending_polls: u32,
}

/// Mock runtime for testing.
pub struct MockRuntime {
    containers: Arc<Mutex<HashMap<String, MockContainer>>>,
    calls: Arc<Mutex<Vec<RuntimeCall>>>,
    /// Address assigned to every container created by this runtime.
    pub container_ip: IpAddr,
    /// Number of `inspect_state` polls a new container reports stopped before running.
    pub start_delay_polls: u32,
    /// If true, new containers never reach the running state.
    pub never_start: bool,
    /// Container names whose `run` fails with a start error.
    pub fail_run: HashSet<String>,
    /// If true, every `exec_one_shot` fails.
    pub fail_exec: bool,
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRuntime {
    /// Create a mock runtime where containers start immediately on loopback.
    pub fn new() -> Self {
        Self {
            containers: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            container_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            start_delay_polls: 0,
            never_start: false,
            fail_run: HashSet::new(),
            fail_exec: false,
        }
    }

    /// Create a mock runtime whose containers never leave the stopped state.
    pub fn never_starting() -> Self {
        Self {
            never_start: true,
            ..Self::new()
        }
    }

    /// Seed a container that already exists in the given state.
    pub async fn insert(&self, name: &str, state: RuntimeState) {
        let mut containers = self.containers.lock().await;
        containers.insert(
            name.to_string(),
            MockContainer {
                state,
                ip: self.container_ip,
                spec: None,
                pending_polls: 0,
            },
        );
    }

    /// Force the state of an existing container.
    pub async fn set_state(&self, name: &str, state: RuntimeState) {
        let mut containers = self.containers.lock().await;
        if let Some(container) = containers.get_mut(name) {
            container.state = state;
            container.pending_polls = 0;
        }
    }

    /// All calls recorded so far, in order.
    pub async fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().await.clone()
    }

    /// Calls that mutated the container namespace.
    pub async fn mutations(&self) -> Vec<RuntimeCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    /// Names passed to `run`, in order.
    pub async fn started(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                RuntimeCall::Run(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// The `ComponentSpec` a container was last started with.
    pub async fn spec_of(&self, name: &str) -> Option<ComponentSpec> {
        let containers = self.containers.lock().await;
        containers.get(name).and_then(|c| c.spec.clone())
    }

    /// Clear the recorded call log.
    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    async fn record(&self, call: RuntimeCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    fn runtime_type(&self) -> &'static str {
        "mock"
    }

    async fn inspect_state(&self, name: &str) -> Result<RuntimeState> {
        self.record(RuntimeCall::InspectState(name.to_string())).await;

        let mut containers = self.containers.lock().await;
        let Some(container) = containers.get_mut(name) else {
            return Ok(RuntimeState::Absent);
        };

        if container.state == RuntimeState::Stopped && container.spec.is_some() && !self.never_start
        {
            if container.pending_polls == 0 {
                container.state = RuntimeState::Running;
            } else {
                container.pending_polls -= 1;
            }
        }
        Ok(container.state)
    }

    async fn inspect_ip(&self, name: &str) -> Result<IpAddr> {
        self.record(RuntimeCall::InspectIp(name.to_string())).await;

        let containers = self.containers.lock().await;
        match containers.get(name) {
            Some(c) if c.state == RuntimeState::Running => Ok(c.ip),
            Some(_) => Err(RuntimeError::NoAddress(name.to_string())),
            None => Err(RuntimeError::NotFound(name.to_string())),
        }
    }

    async fn remove(&self, name: &str, force: bool) -> Result<()> {
        self.record(RuntimeCall::Remove(name.to_string())).await;

        let mut containers = self.containers.lock().await;
        if containers.remove(name).is_none() && !force {
            return Err(RuntimeError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn run(&self, spec: &ComponentSpec) -> Result<String> {
        self.record(RuntimeCall::Run(spec.name.clone())).await;

        if self.fail_run.contains(&spec.name) {
            return Err(RuntimeError::Command {
                command: "mock run".to_string(),
                exit_code: 125,
                stderr: format!("Mock start failure for {}", spec.name),
            });
        }

        let mut containers = self.containers.lock().await;
        if containers.contains_key(&spec.name) {
            return Err(RuntimeError::Command {
                command: "mock run".to_string(),
                exit_code: 125,
                stderr: format!("container name {} is already in use", spec.name),
            });
        }
        containers.insert(
            spec.name.clone(),
            MockContainer {
                state: RuntimeState::Stopped,
                ip: self.container_ip,
                spec: Some(spec.clone()),
                pending_polls: self.start_delay_polls,
            },
        );
        Ok(format!("mock_{}", spec.name))
    }

    async fn exec_one_shot(&self, image: &str, command: &[String]) -> Result<String> {
        self.record(RuntimeCall::Exec {
            image: image.to_string(),
            command: command.join(" "),
        })
        .await;

        if self.fail_exec {
            return Err(RuntimeError::Command {
                command: "mock run --rm".to_string(),
                exit_code: 1,
                stderr: "Mock exec failure".to_string(),
            });
        }
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ComponentSpec {
        ComponentSpec::new("busybox", name)
    }

    #[tokio::test]
    async fn test_mock_runtime_absent_by_default() {
        let runtime = MockRuntime::new();
        assert_eq!(
            runtime.inspect_state("nothing").await.unwrap(),
            RuntimeState::Absent
        );
    }

    #[tokio::test]
    async fn test_mock_runtime_start_delay() {
        let runtime = MockRuntime {
            start_delay_polls: 2,
            ..MockRuntime::new()
        };
        runtime.run(&spec("db")).await.unwrap();

        assert_eq!(runtime.inspect_state("db").await.unwrap(), RuntimeState::Stopped);
        assert_eq!(runtime.inspect_state("db").await.unwrap(), RuntimeState::Stopped);
        assert_eq!(runtime.inspect_state("db").await.unwrap(), RuntimeState::Running);
        assert_eq!(
            runtime.inspect_ip("db").await.unwrap(),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
    }

    #[tokio::test]
    async fn test_mock_runtime_never_starting() {
        let runtime = MockRuntime::never_starting();
        runtime.run(&spec("db")).await.unwrap();
        for _ in 0..5 {
            assert_eq!(runtime.inspect_state("db").await.unwrap(), RuntimeState::Stopped);
        }
    }

    #[tokio::test]
    async fn test_mock_runtime_name_conflict() {
        let runtime = MockRuntime::new();
        runtime.run(&spec("db")).await.unwrap();
        assert!(runtime.run(&spec("db")).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_runtime_force_remove_missing() {
        let runtime = MockRuntime::new();
        assert!(runtime.remove("db", true).await.is_ok());
        assert!(matches!(
            runtime.remove("db", false).await,
            Err(RuntimeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_runtime_records_mutations() {
        let runtime = MockRuntime::new();
        runtime.inspect_state("db").await.unwrap();
        runtime.remove("db", true).await.unwrap();
        runtime.run(&spec("db")).await.unwrap();

        assert_eq!(runtime.calls().await.len(), 3);
        assert_eq!(
            runtime.mutations().await,
            vec![
                RuntimeCall::Remove("db".to_string()),
                RuntimeCall::Run("db".to_string())
            ]
        );
        assert_eq!(runtime.started().await, vec!["db".to_string()]);
    }
}
