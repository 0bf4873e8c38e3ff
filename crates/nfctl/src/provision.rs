// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database provisioning through a throwaway client container.

use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::runtime::{ContainerRuntime, Result};

/// Runs CQL batches against a database container.
pub struct Provisioner {
    runtime: Arc<dyn ContainerRuntime>,
    client_image: String,
}

impl Provisioner {
    /// Use `client_image` (which must ship `cqlsh`) to run batches.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, client_image: impl Into<String>) -> Self {
        Self {
            runtime,
            client_image: client_image.into(),
        }
    }

    /// Execute `batch` against the database at `address`.
    pub async fn execute(&self, address: IpAddr, batch: &str) -> Result<String> {
        info!(%address, image = %self.client_image, "Running provisioning batch");
        debug!(batch = %batch, "Batch contents");
        let command = vec![
            "cqlsh".to_string(),
            address.to_string(),
            "-e".to_string(),
            batch.to_string(),
        ];
        self.runtime.exec_one_shot(&self.client_image, &command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RuntimeCall};

    #[tokio::test]
    async fn test_execute_runs_cqlsh() {
        let runtime = Arc::new(MockRuntime::new());
        let provisioner = Provisioner::new(runtime.clone(), "cassandra:2.1");

        provisioner
            .execute("172.17.0.2".parse().unwrap(), "SELECT now() FROM system.local;")
            .await
            .unwrap();

        assert_eq!(
            runtime.calls().await,
            vec![RuntimeCall::Exec {
                image: "cassandra:2.1".to_string(),
                command: "cqlsh 172.17.0.2 -e SELECT now() FROM system.local;".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_execute_failure() {
        let mut mock = MockRuntime::new();
        mock.fail_exec = true;
        let runtime = Arc::new(mock);
        let provisioner = Provisioner::new(runtime, "cassandra:2.1");
        assert!(
            provisioner
                .execute("172.17.0.2".parse().unwrap(), "x")
                .await
                .is_err()
        );
    }
}
