// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Container runtime trait definitions.
//!
//! Defines the narrow capability interface the launcher needs from a
//! container runtime. Any runtime exposing equivalent primitives can back it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use thiserror::Error;

use crate::spec::ComponentSpec;

/// Errors from container runtime operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// The runtime CLI binary could not be spawned.
    #[error("Failed to invoke {binary}: {source}")]
    Spawn {
        /// Binary that was invoked.
        binary: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The runtime command exited with a non-zero code.
    #[error("{command} exited with code {exit_code}: {stderr}")]
    Command {
        /// Short description of the command (e.g. `docker run`).
        command: String,
        /// Exit code from the process.
        exit_code: i32,
        /// Standard error output.
        stderr: String,
    },

    /// No container with the given name exists.
    #[error("No such container: {0}")]
    NotFound(String),

    /// The container exists but has no address on any network.
    #[error("Container {0} has no IP address")]
    NoAddress(String),

    /// The runtime produced output that could not be interpreted.
    #[error("Unexpected runtime output: {0}")]
    Parse(String),

    /// JSON deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Live state of a named container, as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeState {
    /// No container with that name exists.
    Absent,
    /// The container is running.
    Running,
    /// The container exists but is not running (created, exited, paused, dead).
    Stopped,
}

impl RuntimeState {
    /// Map a runtime status string (e.g. `"running"`, `"exited"`) to a state.
    pub fn from_status(status: &str) -> Self {
        if status.eq_ignore_ascii_case("running") {
            RuntimeState::Running
        } else {
            RuntimeState::Stopped
        }
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeState::Absent => write!(f, "absent"),
            RuntimeState::Running => write!(f, "running"),
            RuntimeState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Trait for container runtimes.
///
/// Runtimes are PURE execution backends: they know nothing about components,
/// dependencies or provisioning. All names are container names in the
/// runtime's global namespace.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Runtime type identifier (e.g., "docker", "podman", "mock").
    fn runtime_type(&self) -> &'static str;

    /// Query the current state of a named container.
    async fn inspect_state(&self, name: &str) -> Result<RuntimeState>;

    /// Query the IP address of a named container.
    async fn inspect_ip(&self, name: &str) -> Result<IpAddr>;

    /// Remove a named container, killing it if needed.
    ///
    /// When `force` is set, a missing container is not an error.
    async fn remove(&self, name: &str, force: bool) -> Result<()>;

    /// Create and start a detached container. Returns the container ID.
    async fn run(&self, spec: &ComponentSpec) -> Result<String>;

    /// Run a throwaway container to completion and return its stdout.
    async fn exec_one_shot(&self, image: &str, command: &[String]) -> Result<String>;
}
