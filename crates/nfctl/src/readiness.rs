// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded polling for container state and service sockets.
//!
//! Both waits check once immediately, then once per tick until the timeout
//! is used up. A timeout of `T` with a tick of `t` therefore makes at most
//! `ceil(T / t) + 1` checks. Every socket attempt is itself bounded by one
//! tick so an unresponsive host cannot stall the loop.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::runtime::{ContainerRuntime, Result, RuntimeState};

/// Polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// Interval between checks.
    pub tick: Duration,
    /// Default timeout for state waits.
    pub state_timeout: Duration,
    /// Default timeout for socket waits.
    pub socket_timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            state_timeout: Duration::from_secs(30),
            socket_timeout: Duration::from_secs(120),
        }
    }
}

/// Outcome of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessResult {
    /// The condition held before the timeout.
    Ready,
    /// The timeout elapsed first.
    TimedOut,
}

impl ReadinessResult {
    /// Whether the wait succeeded.
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessResult::Ready)
    }
}

/// Tick schedule for one wait.
struct Countdown {
    start: Instant,
    tick: Duration,
    timeout: Duration,
    ticks: u32,
    elapsed_ticks: u32,
}

impl Countdown {
    fn new(tick: Duration, timeout: Duration) -> Self {
        let tick = tick.max(Duration::from_millis(1));
        let ticks = timeout.as_nanos().div_ceil(tick.as_nanos());
        Self {
            start: Instant::now(),
            tick,
            timeout,
            ticks: u32::try_from(ticks).unwrap_or(u32::MAX),
            elapsed_ticks: 0,
        }
    }

    fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.start.elapsed())
    }

    /// Sleep until the next tick. Returns false once the budget is spent.
    async fn next(&mut self) -> bool {
        if self.elapsed_ticks >= self.ticks {
            return false;
        }
        self.elapsed_ticks += 1;
        tokio::time::sleep_until(self.start + self.tick * self.elapsed_ticks).await;
        true
    }
}

/// Waits for containers to reach a state and for sockets to accept connections.
pub struct ReadinessWaiter {
    runtime: Arc<dyn ContainerRuntime>,
    config: ReadinessConfig,
}

impl ReadinessWaiter {
    /// Create a waiter over `runtime`.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: ReadinessConfig) -> Self {
        Self { runtime, config }
    }

    /// Polling parameters in use.
    pub fn config(&self) -> &ReadinessConfig {
        &self.config
    }

    /// Single check: is `name` currently in `target` state?
    pub async fn poll_state(&self, name: &str, target: RuntimeState) -> Result<bool> {
        Ok(self.runtime.inspect_state(name).await? == target)
    }

    /// Wait until `name` reports `target`.
    ///
    /// `timeout` defaults to the configured state timeout. Runtime errors
    /// abort the wait; an absent container just keeps the wait going.
    pub async fn wait_for_state(
        &self,
        name: &str,
        target: RuntimeState,
        timeout: Option<Duration>,
    ) -> Result<ReadinessResult> {
        let timeout = timeout.unwrap_or(self.config.state_timeout);
        let mut countdown = Countdown::new(self.config.tick, timeout);

        loop {
            if self.poll_state(name, target).await? {
                debug!(container = %name, state = %target, "Container reached state");
                return Ok(ReadinessResult::Ready);
            }
            info!(
                container = %name,
                state = %target,
                remaining_secs = countdown.remaining().as_secs(),
                "Waiting for container state"
            );
            if !countdown.next().await {
                return Ok(ReadinessResult::TimedOut);
            }
        }
    }

    /// Single connection attempt bounded by `attempt_timeout`.
    pub async fn poll_socket(&self, addr: SocketAddr, attempt_timeout: Duration) -> bool {
        match tokio::time::timeout(attempt_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(%addr, error = %e, "Connection refused");
                false
            }
            Err(_) => {
                debug!(%addr, "Connection attempt timed out");
                false
            }
        }
    }

    /// Wait until `host:port` accepts a TCP connection.
    ///
    /// `timeout` defaults to the configured socket timeout.
    pub async fn wait_for_socket(
        &self,
        host: IpAddr,
        port: u16,
        timeout: Option<Duration>,
    ) -> ReadinessResult {
        let addr = SocketAddr::new(host, port);
        let timeout = timeout.unwrap_or(self.config.socket_timeout);
        let mut countdown = Countdown::new(self.config.tick, timeout);

        loop {
            if self.poll_socket(addr, countdown.tick).await {
                debug!(%addr, "Socket accepting connections");
                return ReadinessResult::Ready;
            }
            info!(
                %addr,
                remaining_secs = countdown.remaining().as_secs(),
                "Waiting for socket"
            );
            if !countdown.next().await {
                return ReadinessResult::TimedOut;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RuntimeCall};
    use crate::spec::ComponentSpec;

    fn waiter(runtime: Arc<MockRuntime>, tick_ms: u64) -> ReadinessWaiter {
        ReadinessWaiter::new(
            runtime,
            ReadinessConfig {
                tick: Duration::from_millis(tick_ms),
                state_timeout: Duration::from_millis(tick_ms * 5),
                socket_timeout: Duration::from_millis(tick_ms * 5),
            },
        )
    }

    #[test]
    fn test_default_config() {
        let config = ReadinessConfig::default();
        assert_eq!(config.tick, Duration::from_secs(1));
        assert_eq!(config.state_timeout, Duration::from_secs(30));
        assert_eq!(config.socket_timeout, Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_wait_counts_checks() {
        let runtime = Arc::new(MockRuntime::never_starting());
        runtime.run(&ComponentSpec::new("busybox", "db")).await.unwrap();
        runtime.clear_calls().await;

        let waiter = waiter(runtime.clone(), 1000);
        let result = waiter
            .wait_for_state("db", RuntimeState::Running, Some(Duration::from_millis(3500)))
            .await
            .unwrap();
        assert_eq!(result, ReadinessResult::TimedOut);

        // ceil(3.5) + 1
        let checks = runtime
            .calls()
            .await
            .into_iter()
            .filter(|c| matches!(c, RuntimeCall::InspectState(_)))
            .count();
        assert_eq!(checks, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_wait_zero_timeout_checks_once() {
        let runtime = Arc::new(MockRuntime::new());
        let waiter = waiter(runtime.clone(), 1000);
        let result = waiter
            .wait_for_state("missing", RuntimeState::Running, Some(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(result, ReadinessResult::TimedOut);
        assert_eq!(runtime.calls().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_state() {
        let runtime = Arc::new(MockRuntime::new());
        runtime.insert("db", RuntimeState::Running).await;
        let waiter = waiter(runtime, 1000);
        assert!(waiter.poll_state("db", RuntimeState::Running).await.unwrap());
        assert!(!waiter.poll_state("db", RuntimeState::Stopped).await.unwrap());
    }

    #[tokio::test]
    async fn test_socket_ready_immediately() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let waiter = waiter(Arc::new(MockRuntime::new()), 20);
        assert!(
            waiter
                .wait_for_socket("127.0.0.1".parse().unwrap(), port, None)
                .await
                .is_ready()
        );
    }

    #[tokio::test]
    async fn test_socket_closed_times_out() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let waiter = waiter(Arc::new(MockRuntime::new()), 20);
        assert_eq!(
            waiter
                .wait_for_socket("127.0.0.1".parse().unwrap(), port, None)
                .await,
            ReadinessResult::TimedOut
        );
    }
}
