// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! nfctl - LTE Network Function Launcher
//!
//! Launches the containers of an LTE core network and radio access network
//! on a single host, in dependency order, waiting for each service to come
//! up before starting the next.
//!
//! # Architecture
//!
//! ```text
//!   nfctl run EPC ENB
//!          │
//!          ▼
//! ┌──────────────────┐   expand aliases, topological order
//! │   Orchestrator   │◄──────────────────────────── Catalog
//! └────────┬─────────┘
//!          │ per launch unit
//!          ▼
//! ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐
//! │   Provisioner    │  │ ContainerHandle  │  │ ReadinessWaiter  │
//! │ (cqlsh one-shot) │  │  start / reuse   │  │  state + socket  │
//! └────────┬─────────┘  └────────┬─────────┘  └────────┬─────────┘
//!          └─────────────────────┼─────────────────────┘
//!                                ▼
//!                    ┌───────────────────────┐
//!                    │   ContainerRuntime    │
//!                    │ (docker CLI, or mock) │
//!                    └───────────────────────┘
//! ```
//!
//! # Components
//!
//! | Tag | Containers | Depends on |
//! |-----|------------|------------|
//! | `HSS` | cassandra, hss | - |
//! | `MME` | mme | HSS |
//! | `SPGW` | placeholder, skipped | MME |
//! | `ENB` | enb (monolithic, USB radio) | MME |
//! | `RCC` | rcc (split eNodeB, cloud part) | MME |
//! | `RRU` | rru (split eNodeB, radio part) | RCC |
//!
//! The alias `EPC` expands to `HSS MME SPGW`.
//!
//! # Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `NFCTL_CONTAINER_RUNTIME` | `docker` | Runtime CLI binary |
//! | `NFCTL_PLATFORM` | from os-release | Image tag |
//! | `NFCTL_REGISTRY` | from os-release | Image registry prefix |
//! | `NFCTL_OS_RELEASE` | `/etc/os-release` | os-release file to read |
//! | `NFCTL_NAME_PREFIX` | `nfctl` | Container name prefix |
//! | `NFCTL_DB_IMAGE` | `cassandra:2.1` | Database and provisioning client image |
//! | `NFCTL_PROBE_TARGET` | `8.8.8.8` | Address used to find the outbound interface |
//! | `NFCTL_STATE_TIMEOUT_SECS` | `30` | Container state timeout |
//! | `NFCTL_SOCKET_TIMEOUT_SECS` | `120` | Socket readiness timeout |
//!
//! # Modules
//!
//! - [`catalog`]: Component definitions and dependency ordering
//! - [`cli`]: Command-line arguments
//! - [`component`]: Tags, aliases and lifecycle phases
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types
//! - [`handle`]: Single-container start and readiness
//! - [`network`]: Host network discovery
//! - [`orchestrator`]: Request execution
//! - [`provision`]: Database provisioning
//! - [`readiness`]: Bounded polling
//! - [`runtime`]: Container runtime backends
//! - [`spec`]: Resolved container launch descriptions
//! - [`template`]: Placeholder rendering

#![deny(missing_docs)]

/// Component definitions, validation and dependency ordering.
pub mod catalog;

/// Command-line arguments.
pub mod cli;

/// Component tags, aliases and lifecycle phases.
pub mod component;

/// Configuration loaded from environment variables.
pub mod config;

/// Error types for launcher operations.
pub mod error;

/// Idempotent start and readiness of one container.
pub mod handle;

/// Host network discovery.
pub mod network;

/// Orchestration of a launch request.
pub mod orchestrator;

/// Database provisioning through one-shot client containers.
pub mod provision;

/// Bounded polling for container state and sockets.
pub mod readiness;

/// Container runtime backends (docker CLI, mock).
pub mod runtime;

/// Resolved container launch descriptions.
pub mod spec;

/// Placeholder templates.
pub mod template;

pub use catalog::{Catalog, CatalogSettings};
pub use component::{ComponentPhase, ComponentTag, expand_tags};
pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use handle::{ContainerHandle, RuntimeInfo, StartOutcome};
pub use network::{HostNetwork, HostNetworkProbe};
pub use orchestrator::{Orchestrator, Plan, RunReport};
pub use readiness::{ReadinessConfig, ReadinessResult, ReadinessWaiter};
pub use runtime::{ContainerRuntime, DockerRuntime, MockRuntime, RuntimeState};
pub use spec::ComponentSpec;
