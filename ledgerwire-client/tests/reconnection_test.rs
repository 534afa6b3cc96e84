//! Integration tests for automatic reconnection and the heartbeat

mod common;

use common::*;
use ledgerwire_client::{ConnectionBuilder, ConnectionEvent, FixedDelay, NoRetry, SessionState};
use ledgerwire_core::Error;
use serde_json::{json, Value};
use std::time::Duration;

async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("condition not reached within 5s");
}

#[tokio::test]
async fn test_unexpected_close_reconnects() {
    let server = MockRippled::start().await;
    let connection = ConnectionBuilder::new(server.url())
        .without_heartbeat()
        .retry_policy(Box::new(FixedDelay::new(Duration::from_millis(50))))
        .build();
    let mut events = connection.events();

    connection.connect().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected
    ));

    server.force_close(1001);

    match next_event(&mut events).await {
        ConnectionEvent::Disconnected { code } => assert_eq!(code, 1001),
        other => panic!("expected Disconnected, got {other:?}"),
    }
    match next_event(&mut events).await {
        ConnectionEvent::Reconnecting { attempt } => assert_eq!(attempt, 1),
        other => panic!("expected Reconnecting, got {other:?}"),
    }
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected
    ));

    assert!(connection.is_connected());
    assert_eq!(server.connections(), 2);

    server.shutdown().await;
}

#[tokio::test]
async fn test_inflight_requests_fail_when_the_socket_drops() {
    let mut server = MockRippled::start().await;
    let connection = ConnectionBuilder::new(server.url())
        .without_heartbeat()
        .retry_policy(Box::new(NoRetry))
        .build();
    connection.connect().await.unwrap();
    server.wait_for_message().await.unwrap(); // subscribe

    let pending = {
        let connection = connection.clone();
        tokio::spawn(async move {
            connection.request(json!({ "command": "void" }), None).await
        })
    };
    // Make sure the request is on the wire before dropping the socket
    server.wait_for_message().await.unwrap();

    server.force_close(1000);

    assert!(matches!(
        pending.await.unwrap(),
        Err(Error::Disconnected(_))
    ));

    server.shutdown().await;
}

#[tokio::test]
async fn test_retry_policy_giving_up_settles_disconnected() {
    let server = MockRippled::start().await;
    let connection = ConnectionBuilder::new(server.url())
        .without_heartbeat()
        .retry_policy(Box::new(NoRetry))
        .build();
    let mut events = connection.events();

    connection.connect().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected
    ));

    server.force_close(1006);

    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Disconnected { .. }
    ));
    wait_until(|| connection.state() == SessionState::Disconnected).await;
    assert_eq!(server.connections(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn test_manual_reconnect_opens_a_fresh_session() {
    let server = MockRippled::start().await;
    let connection = ConnectionBuilder::new(server.url())
        .without_heartbeat()
        .build();

    connection.connect().await.unwrap();
    connection.reconnect().await.unwrap();

    assert!(connection.is_connected());
    assert_eq!(server.connections(), 2);
    assert_eq!(connection.ledger_version().await.unwrap(), 8_820_051);

    server.shutdown().await;
}

/// A manual connect() that restores the session during the retry delay wins;
/// the superseded retry attempt stays silent when it wakes up.
#[tokio::test]
async fn test_manual_connect_during_retry_delay_silences_the_retry() {
    let server = MockRippled::start().await;
    let connection = ConnectionBuilder::new(server.url())
        .without_heartbeat()
        .retry_policy(Box::new(FixedDelay::new(Duration::from_millis(250))))
        .build();
    let mut events = connection.events();

    connection.connect().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected
    ));

    server.force_close(1006);
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Disconnected { .. }
    ));

    // Beat the retry task to the reconnect
    connection.connect().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected
    ));

    // The retry attempt wakes, finds the session restored and backs off
    // without emitting Reconnecting or touching the state
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(connection.state(), SessionState::Ready);
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
    assert_eq!(server.connections(), 2);

    server.shutdown().await;
}

#[tokio::test]
async fn test_requests_wait_through_a_retry_window() {
    let server = MockRippled::start().await;
    let connection = ConnectionBuilder::new(server.url())
        .without_heartbeat()
        .retry_policy(Box::new(FixedDelay::new(Duration::from_millis(100))))
        .build();
    let mut events = connection.events();

    connection.connect().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected
    ));

    server.force_close(1006);
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Disconnected { .. }
    ));

    // The outage is owned by the retry loop; a request issued now waits for
    // the next session instead of failing
    let result = connection
        .request(json!({ "command": "ping" }), Some(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(result, json!({}));
    assert_eq!(server.connections(), 2);

    server.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_cancels_pending_reconnect() {
    let server = MockRippled::start().await;
    let connection = ConnectionBuilder::new(server.url())
        .without_heartbeat()
        .retry_policy(Box::new(FixedDelay::new(Duration::from_secs(60))))
        .build();
    let mut events = connection.events();

    connection.connect().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected
    ));

    server.force_close(1006);
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Disconnected { .. }
    ));

    connection.disconnect().await;
    assert_eq!(connection.state(), SessionState::Disconnected);

    // No second session shows up
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.connections(), 1);

    server.shutdown().await;
}

/// A disconnect() issued the instant the close is observed must win against
/// the retry task that the close handler is spawning concurrently.
#[tokio::test]
async fn test_disconnect_racing_retry_spawn_stays_down() {
    let server = MockRippled::start().await;
    let connection = ConnectionBuilder::new(server.url())
        .without_heartbeat()
        .retry_policy(Box::new(FixedDelay::new(Duration::from_millis(1))))
        .build();
    let mut events = connection.events();

    connection.connect().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected
    ));

    server.force_close(1006);
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Disconnected { .. }
    ));
    connection.disconnect().await;

    // The session must not come back, no matter how the retry task and the
    // disconnect interleaved
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(connection.state(), SessionState::Disconnected);
    assert!(!connection.is_connected());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(connection.state(), SessionState::Disconnected);

    let err = connection
        .request(json!({ "command": "ping" }), None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotConnected(_)));

    server.shutdown().await;
}

#[tokio::test]
async fn test_heartbeat_pings_periodically() {
    let mut server = MockRippled::start().await;
    let connection = ConnectionBuilder::new(server.url())
        .heartbeat_interval(Duration::from_millis(100))
        .build();

    connection.connect().await.unwrap();
    server.wait_for_message().await.unwrap(); // subscribe

    let ping: Value = serde_json::from_str(&server.wait_for_message().await.unwrap()).unwrap();
    assert_eq!(ping["command"], "ping");
    let ping: Value = serde_json::from_str(&server.wait_for_message().await.unwrap()).unwrap();
    assert_eq!(ping["command"], "ping");

    connection.disconnect().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_failed_heartbeat_restarts_the_session() {
    // Swallow pings so the heartbeat request times out
    let server = MockRippled::with_handler(|req| async move {
        if req["command"] == "ping" {
            None
        } else {
            default_response(&req)
        }
    })
    .await;

    let connection = ConnectionBuilder::new(server.url())
        .heartbeat_interval(Duration::from_millis(100))
        .request_timeout(Duration::from_millis(100))
        .retry_policy(Box::new(FixedDelay::new(Duration::from_millis(50))))
        .build();
    let mut events = connection.events();

    connection.connect().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected
    ));

    // Ping at ~100ms, timeout at ~200ms, then teardown and reconnect
    wait_until(|| server.connections() >= 2).await;

    server.shutdown().await;
}
