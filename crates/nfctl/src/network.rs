// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Host network discovery.
//!
//! Finds the interface and source address the host uses to reach a
//! well-known external address. The result is computed once at startup and
//! passed explicitly to everything that needs it.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Errors from host network discovery.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProbeError {
    /// The `ip` tool could not be run.
    #[error("Failed to run ip: {0}")]
    Io(#[from] std::io::Error),

    /// The host has no route to the probe target.
    #[error("No default route to {target}: {detail}")]
    NoRoute {
        /// Address that was looked up.
        target: String,
        /// Output explaining the failure.
        detail: String,
    },

    /// The route lookup output lacks an interface or source address.
    #[error("Cannot parse route output: {0}")]
    Parse(String),
}

/// Result type for probe operations.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Outbound interface and address of the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostNetwork {
    /// Interface name (e.g. `eth0`).
    pub interface: String,
    /// IPv4 source address on that interface.
    pub address: Ipv4Addr,
}

impl HostNetwork {
    /// Parse the output of `ip route get <target>`.
    ///
    /// Format: `8.8.8.8 via 192.168.1.1 dev eth0 src 192.168.1.95 uid 1000`
    pub fn from_route_output(output: &str) -> Result<Self> {
        let tokens: Vec<&str> = output.split_whitespace().collect();
        let value_after = |key: &str| {
            tokens
                .iter()
                .position(|t| *t == key)
                .and_then(|i| tokens.get(i + 1))
                .copied()
        };

        let interface = value_after("dev")
            .ok_or_else(|| ProbeError::Parse(format!("no interface in {:?}", output.trim())))?;
        let address = value_after("src")
            .ok_or_else(|| ProbeError::Parse(format!("no source address in {:?}", output.trim())))?
            .parse::<Ipv4Addr>()
            .map_err(|e| ProbeError::Parse(e.to_string()))?;

        Ok(Self {
            interface: interface.to_string(),
            address,
        })
    }
}

/// Discovers the host's outbound interface by asking the routing table.
#[derive(Debug, Clone)]
pub struct HostNetworkProbe {
    target: String,
}

impl Default for HostNetworkProbe {
    fn default() -> Self {
        Self::new("8.8.8.8")
    }
}

impl HostNetworkProbe {
    /// Probe the route towards `target`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Look up the outbound interface and source address. Read-only.
    pub async fn discover(&self) -> Result<HostNetwork> {
        let output = Command::new("ip")
            .args(["-4", "route", "get", &self.target])
            .output()
            .await?;

        if !output.status.success() {
            return Err(ProbeError::NoRoute {
                target: self.target.clone(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(target = %self.target, route = %stdout.trim(), "Route lookup");

        let host = HostNetwork::from_route_output(&stdout)?;
        info!(
            interface = %host.interface,
            address = %host.address,
            "Discovered host network"
        );
        Ok(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route_via_gateway() {
        let host = HostNetwork::from_route_output(
            "8.8.8.8 via 192.168.1.1 dev enp3s0 src 192.168.1.95 uid 1000 \n    cache \n",
        )
        .unwrap();
        assert_eq!(host.interface, "enp3s0");
        assert_eq!(host.address, Ipv4Addr::new(192, 168, 1, 95));
    }

    #[test]
    fn test_parse_route_direct() {
        let host = HostNetwork::from_route_output("10.0.0.1 dev eth0 src 10.0.0.5 uid 0").unwrap();
        assert_eq!(host.interface, "eth0");
        assert_eq!(host.address, Ipv4Addr::new(10, 0, 0, 5));
    }

    #[test]
    fn test_parse_route_missing_src() {
        let err = HostNetwork::from_route_output("8.8.8.8 via 10.0.0.1 dev eth0").unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
    }

    #[test]
    fn test_parse_route_empty() {
        assert!(HostNetwork::from_route_output("").is_err());
    }

    #[tokio::test]
    async fn test_discover() {
        // Optional: only meaningful on hosts with a default route
        if let Ok(host) = HostNetworkProbe::default().discover().await {
            assert!(!host.interface.is_empty());
            assert!(!host.address.is_loopback());
        }
    }
}
