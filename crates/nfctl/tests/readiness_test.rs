// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tests for readiness polling and single-container handles.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{closed_port, fast_readiness};
use nfctl::error::Error;
use nfctl::handle::ContainerHandle;
use nfctl::readiness::{ReadinessConfig, ReadinessResult, ReadinessWaiter};
use nfctl::runtime::{ContainerRuntime, MockRuntime, RuntimeState};
use nfctl::spec::{ComponentSpec, ReadinessTarget, TargetHost};
use tokio::net::TcpListener;

fn loopback() -> std::net::IpAddr {
    "127.0.0.1".parse().unwrap()
}

// ============================================================================
// State waits
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_state_reached_within_ticks() {
    let mut mock = MockRuntime::new();
    mock.start_delay_polls = 3;
    let runtime = Arc::new(mock);
    runtime
        .run(&ComponentSpec::new("cassandra:2.1", "db"))
        .await
        .unwrap();

    let waiter = ReadinessWaiter::new(runtime.clone(), ReadinessConfig::default());
    let started = tokio::time::Instant::now();
    let result = waiter
        .wait_for_state("db", RuntimeState::Running, None)
        .await
        .unwrap();

    assert_eq!(result, ReadinessResult::Ready);
    // Three stopped polls, one tick apart, then running
    assert_eq!(started.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_state_timeout_uses_configured_default() {
    let runtime = Arc::new(MockRuntime::never_starting());
    runtime
        .run(&ComponentSpec::new("cassandra:2.1", "db"))
        .await
        .unwrap();

    let waiter = ReadinessWaiter::new(runtime, ReadinessConfig::default());
    let started = tokio::time::Instant::now();
    let result = waiter
        .wait_for_state("db", RuntimeState::Running, None)
        .await
        .unwrap();

    assert_eq!(result, ReadinessResult::TimedOut);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_state_wait_for_stopped() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.insert("db", RuntimeState::Running).await;

    let waiter = ReadinessWaiter::new(runtime.clone(), ReadinessConfig::default());
    let stopper = {
        let runtime = runtime.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            runtime.set_state("db", RuntimeState::Stopped).await;
        })
    };

    let result = waiter
        .wait_for_state("db", RuntimeState::Stopped, Some(Duration::from_secs(10)))
        .await
        .unwrap();
    stopper.await.unwrap();
    assert!(result.is_ready());
}

// ============================================================================
// Socket waits
// ============================================================================

#[tokio::test]
async fn test_socket_ready_on_first_tick_after_opening() {
    let tick = Duration::from_millis(200);
    // Between the third and fourth connect attempt (0, 200, 400, 600ms)
    let opens_at = Duration::from_millis(500);
    let port = closed_port();
    let waiter = ReadinessWaiter::new(
        Arc::new(MockRuntime::new()),
        ReadinessConfig {
            tick,
            state_timeout: Duration::from_secs(5),
            socket_timeout: Duration::from_secs(5),
        },
    );

    let opener = tokio::spawn(async move {
        tokio::time::sleep(opens_at).await;
        TcpListener::bind(("127.0.0.1", port)).await.unwrap()
    });

    let started = std::time::Instant::now();
    let result = waiter.wait_for_socket(loopback(), port, None).await;
    let elapsed = started.elapsed();
    let _listener = opener.await.unwrap();

    assert_eq!(result, ReadinessResult::Ready);
    assert!(elapsed >= opens_at, "ready before the port opened: {:?}", elapsed);
    assert!(
        elapsed <= opens_at + tick,
        "ready more than one tick after opening: {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_closed_socket_never_reports_ready() {
    let port = closed_port();
    let waiter = ReadinessWaiter::new(Arc::new(MockRuntime::new()), fast_readiness());

    let started = std::time::Instant::now();
    let result = waiter
        .wait_for_socket(loopback(), port, Some(Duration::from_millis(100)))
        .await;

    assert_eq!(result, ReadinessResult::TimedOut);
    assert!(started.elapsed() >= Duration::from_millis(100));
}

#[tokio::test]
async fn test_poll_socket_single_attempt() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open = listener.local_addr().unwrap();
    let waiter = ReadinessWaiter::new(Arc::new(MockRuntime::new()), fast_readiness());

    assert!(waiter.poll_socket(open, Duration::from_millis(100)).await);
    let closed = std::net::SocketAddr::new(loopback(), closed_port());
    assert!(!waiter.poll_socket(closed, Duration::from_millis(100)).await);
}

// ============================================================================
// Container handle
// ============================================================================

#[tokio::test]
async fn test_handle_uses_fixed_readiness_host() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut mock = MockRuntime::new();
    // Container address is unreachable; the probe must use the fixed host
    mock.container_ip = "192.0.2.55".parse().unwrap();
    let runtime = Arc::new(mock);
    let handle = ContainerHandle::new(runtime, fast_readiness());

    let spec = ComponentSpec::new("oai-enb", "rcc").with_readiness(ReadinessTarget {
        host: TargetHost::Fixed(loopback()),
        port,
    });
    let info = handle.run(&spec).await.unwrap();

    assert_eq!(info.address, "192.0.2.55".parse::<std::net::IpAddr>().unwrap());
}

#[tokio::test]
async fn test_handle_without_target_waits_for_state_only() {
    let handle = ContainerHandle::new(Arc::new(MockRuntime::new()), fast_readiness());
    let info = handle
        .run(&ComponentSpec::new("oai-enb", "enb"))
        .await
        .unwrap();
    assert!(!info.reused);
}

#[tokio::test]
async fn test_handle_state_timeout_names_container() {
    let handle = ContainerHandle::new(Arc::new(MockRuntime::never_starting()), fast_readiness());
    let err = handle
        .run(&ComponentSpec::new("oai-hss", "hss"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::StateTimeout { ref name, state: RuntimeState::Running, .. } if name == "hss"
    ));
    assert!(
        err.to_string()
            .starts_with("Container hss did not become running within")
    );
}
