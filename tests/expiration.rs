//! ClientId lifecycle tests: count- and time-based expiration, and the
//! forced-reconnect policies.

mod helpers;

use std::time::Duration;

use cometd_mock::prelude::*;
use helpers::{configure_tracing, handshake_id};
use tokio::time::Instant;

const HOLD_MS: u64 = 1_000;

fn server_with(config: ServerConfig) -> MockServer {
    configure_tracing();
    MockServer::start(config)
}

async fn connect_once(server: &MockServer, client_id: &str) -> Vec<Message> {
    server
        .connect(Message::connect(client_id))
        .await
        .expect("server alive")
}

#[tokio::test(start_paused = true)]
async fn count_threshold_expires_after_n_connects() {
    let config = ServerConfig::builder()
        .connect_timeout(HOLD_MS)
        .expire_after(2)
        .build()
        .unwrap();
    let server = server_with(config);
    let client_id = handshake_id(&server).await;

    // The threshold admits exactly two completed connects.
    for round in 1..=2u32 {
        let replies = connect_once(&server, &client_id).await;
        assert_eq!(replies[0].successful, Some(true), "connect #{round}");
    }

    // The third trips the policy at release time.
    let replies = connect_once(&server, &client_id).await;
    assert_eq!(replies[0].successful, Some(false));
    let error = replies[0].error.clone().expect("error descriptor");
    assert!(error.starts_with("402::"), "unexpected error: {error}");
    assert_eq!(
        replies[0].advice.expect("advice").reconnect,
        Reconnect::Handshake
    );

    // The session is gone, and stays distinguishable from an unknown id.
    assert_eq!(server.session_count().await.unwrap(), 0);
    assert_eq!(
        server.session(&client_id).await.unwrap_err(),
        Error::ClientExpired {
            client_id: client_id.clone()
        }
    );

    // Further connects fail fast with the same advice.
    let start = Instant::now();
    let replies = connect_once(&server, &client_id).await;
    assert!(start.elapsed() < Duration::from_millis(HOLD_MS));
    assert_eq!(replies[0].successful, Some(false));
    let error = replies[0].error.clone().expect("error descriptor");
    assert!(error.starts_with("402::"), "unexpected error: {error}");
    assert_eq!(
        replies[0].advice.expect("advice").reconnect,
        Reconnect::Handshake
    );
    server.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn expired_client_can_rehandshake_for_a_fresh_session() {
    let config = ServerConfig::builder()
        .connect_timeout(HOLD_MS)
        .expire_after(1)
        .build()
        .unwrap();
    let server = server_with(config);

    let first = handshake_id(&server).await;
    connect_once(&server, &first).await;
    let replies = connect_once(&server, &first).await;
    assert_eq!(replies[0].successful, Some(false));

    // Re-handshake issues a distinct, working identity.
    let second = handshake_id(&server).await;
    assert_ne!(first, second);
    let replies = connect_once(&server, &second).await;
    assert_eq!(replies[0].successful, Some(true));
    server.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn idle_session_expires_by_time() {
    let config = ServerConfig::builder()
        .connect_timeout(HOLD_MS)
        .expire_after_secs(5)
        .build()
        .unwrap();
    let server = server_with(config);
    let client_id = handshake_id(&server).await;

    tokio::time::sleep(Duration::from_secs(6)).await;

    // The sweep removed it without any touch.
    assert_eq!(server.session_count().await.unwrap(), 0);
    assert_eq!(
        server.session(&client_id).await.unwrap_err(),
        Error::ClientExpired { client_id }
    );
    server.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn expiry_during_a_hold_releases_it_with_rehandshake_advice() {
    let config = ServerConfig::builder()
        .connect_timeout(60_000)
        .expire_after_secs(5)
        .build()
        .unwrap();
    let server = server_with(config);
    let client_id = handshake_id(&server).await;

    let handle = server.handle();
    let poll_client = client_id.clone();
    let start = Instant::now();
    let poll = tokio::spawn(async move {
        handle.connect(Message::connect(&poll_client)).await.unwrap()
    });

    let replies = poll.await.unwrap();
    let elapsed = start.elapsed();

    // Released by the expiry sweep, long before the 60s hold deadline.
    assert!(
        elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(60),
        "hold released after {elapsed:?}"
    );
    assert_eq!(replies[0].successful, Some(false));
    let error = replies[0].error.clone().expect("error descriptor");
    assert!(error.starts_with("402::"), "unexpected error: {error}");
    assert_eq!(
        replies[0].advice.expect("advice").reconnect,
        Reconnect::Handshake
    );
    assert_eq!(server.session_count().await.unwrap(), 0);
    server.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn forced_reconnect_after_n_connects_short_circuits_the_hold() {
    let config = ServerConfig::builder()
        .connect_timeout(HOLD_MS)
        .reconnect_after(2)
        .build()
        .unwrap();
    let server = server_with(config);
    let client_id = handshake_id(&server).await;

    for _ in 0..2 {
        let replies = connect_once(&server, &client_id).await;
        assert_eq!(replies[0].successful, Some(true));
    }

    // Third connect: answered immediately with bare retry advice.
    let start = Instant::now();
    let replies = connect_once(&server, &client_id).await;
    assert!(start.elapsed() < Duration::from_millis(HOLD_MS));
    assert_eq!(replies[0].successful, Some(true));
    let advice = replies[0].advice.expect("advice");
    assert_eq!(advice.reconnect, Reconnect::Retry);
    assert_eq!(advice.interval, None);
    assert_eq!(advice.timeout, None);

    // The counter reset, so the next connect is held normally again.
    let snapshot = server.session(&client_id).await.unwrap();
    assert_eq!(snapshot.connection_count, 1);

    let start = Instant::now();
    let replies = connect_once(&server, &client_id).await;
    assert!(start.elapsed() >= Duration::from_millis(HOLD_MS));
    assert_eq!(replies[0].successful, Some(true));
    server.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn forced_reconnect_by_elapsed_time_resets_its_clock() {
    let config = ServerConfig::builder()
        .connect_timeout(HOLD_MS)
        .reconnect_after_secs(10)
        .build()
        .unwrap();
    let server = server_with(config);
    let client_id = handshake_id(&server).await;

    let replies = connect_once(&server, &client_id).await;
    assert_eq!(replies[0].successful, Some(true));

    tokio::time::sleep(Duration::from_secs(10)).await;

    // Window elapsed: immediate forced retry.
    let start = Instant::now();
    let replies = connect_once(&server, &client_id).await;
    assert!(start.elapsed() < Duration::from_millis(HOLD_MS));
    assert_eq!(replies[0].advice.expect("advice").reconnect, Reconnect::Retry);

    // The window restarted: the follow-up connect is held normally.
    let start = Instant::now();
    let replies = connect_once(&server, &client_id).await;
    assert!(start.elapsed() >= Duration::from_millis(HOLD_MS));
    assert_eq!(replies[0].successful, Some(true));
    server.shutdown().await;
}
