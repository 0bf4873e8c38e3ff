// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for nfctl.
//!
//! Every variant is fatal to an orchestration run: nothing is retried and
//! containers started earlier in the run are left in place.

use std::time::Duration;
use thiserror::Error;

use crate::component::ComponentTag;
use crate::runtime::{RuntimeError, RuntimeState};

/// Launcher errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bad request or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Host network discovery failed.
    #[error("Network probe error: {0}")]
    NetworkProbe(#[from] crate::network::ProbeError),

    /// A container could not be created or started.
    #[error("Failed to start container {name}: {source}")]
    ContainerStart {
        /// Container name.
        name: String,
        /// Runtime failure.
        #[source]
        source: RuntimeError,
    },

    /// A container did not reach a state in time.
    #[error("Container {name} did not become {state} within {timeout:?}")]
    StateTimeout {
        /// Container name.
        name: String,
        /// State that was awaited.
        state: RuntimeState,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// A socket did not accept connections in time.
    #[error("{target} did not accept connections within {timeout:?}")]
    SocketTimeout {
        /// `host:port` that was probed.
        target: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// A provisioning batch failed.
    #[error("Provisioning for {component} failed: {source}")]
    Provisioning {
        /// Component whose step failed.
        component: ComponentTag,
        /// Runtime failure.
        #[source]
        source: RuntimeError,
    },

    /// A dependency outside the request is not running.
    #[error("{component} requires {dependency}, which is not running; request it as well")]
    DependencyNotRunning {
        /// Component being launched.
        component: ComponentTag,
        /// Missing dependency.
        dependency: ComponentTag,
    },

    /// Any other container runtime failure.
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Result type using the launcher Error.
pub type Result<T> = std::result::Result<T, Error>;
