// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for nfctl integration tests.
//!
//! Provides a TestContext with a mock runtime, the standard catalog and
//! real local listeners standing in for each service's readiness socket.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use nfctl::catalog::{Catalog, CatalogSettings};
use nfctl::network::HostNetwork;
use nfctl::orchestrator::Orchestrator;
use nfctl::readiness::ReadinessConfig;
use nfctl::runtime::{MockRuntime, RuntimeCall};
use nfctl::spec::ReadinessTarget;

/// Units of the standard catalog that declare a readiness socket.
pub const READINESS_UNITS: [&str; 4] = ["cassandra", "hss", "mme", "rcc"];

/// Short ticks so timeouts elapse quickly.
pub fn fast_readiness() -> ReadinessConfig {
    ReadinessConfig {
        tick: Duration::from_millis(10),
        state_timeout: Duration::from_millis(200),
        socket_timeout: Duration::from_millis(200),
    }
}

/// Host network used by every test.
pub fn test_host() -> HostNetwork {
    HostNetwork {
        interface: "eth0".to_string(),
        address: "192.0.2.10".parse().unwrap(),
    }
}

/// A port on loopback that nothing listens on.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Test context holding the runtime, catalog and open listeners.
pub struct TestContext {
    pub runtime: Arc<MockRuntime>,
    pub catalog: Catalog,
    _listeners: Vec<TcpListener>,
}

impl TestContext {
    /// Standard catalog with every readiness socket backed by a live listener.
    pub async fn new() -> Self {
        Self::with_runtime(MockRuntime::new()).await
    }

    /// Same as [`TestContext::new`] with a preconfigured mock.
    pub async fn with_runtime(runtime: MockRuntime) -> Self {
        let mut catalog = Catalog::standard(&CatalogSettings::default()).unwrap();
        let mut listeners = Vec::new();
        for key in READINESS_UNITS {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            assert!(catalog.set_readiness(key, Some(ReadinessTarget::container_port(port))));
            listeners.push(listener);
        }
        Self {
            runtime: Arc::new(runtime),
            catalog,
            _listeners: listeners,
        }
    }

    /// Point a unit's readiness at a port nobody listens on.
    pub fn close_socket(&mut self, key: &str) {
        let port = closed_port();
        assert!(
            self.catalog
                .set_readiness(key, Some(ReadinessTarget::container_port(port)))
        );
    }

    /// Orchestrator over this context's runtime and catalog.
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.runtime.clone(),
            self.catalog.clone(),
            test_host(),
            "cassandra:2.1",
        )
        .with_readiness(fast_readiness())
    }

    /// Index of the first call matching `pred`.
    pub async fn position(&self, pred: impl Fn(&RuntimeCall) -> bool) -> Option<usize> {
        self.runtime.calls().await.iter().position(pred)
    }

    /// Index of the `run` call for a container.
    pub async fn run_index(&self, name: &str) -> usize {
        self.position(|c| *c == RuntimeCall::Run(name.to_string()))
            .await
            .unwrap_or_else(|| panic!("{} was never run", name))
    }

    /// Index of the first provisioning exec whose command contains `needle`.
    pub async fn exec_index(&self, needle: &str) -> usize {
        self.position(|c| matches!(c, RuntimeCall::Exec { command, .. } if command.contains(needle)))
            .await
            .unwrap_or_else(|| panic!("no exec containing {:?}", needle))
    }

    /// Number of provisioning execs issued.
    pub async fn exec_count(&self) -> usize {
        self.runtime
            .calls()
            .await
            .iter()
            .filter(|c| matches!(c, RuntimeCall::Exec { .. }))
            .count()
    }
}
