//! Meta channel protocol tests: handshake, subscribe/unsubscribe,
//! disconnect, validation, and routing.

mod helpers;

use std::collections::HashSet;

use cometd_mock::prelude::*;
use cometd_mock::message::{BAYEUX_VERSION, LONG_POLLING};
use helpers::{configure_tracing, handshake_id};

fn server() -> MockServer {
    configure_tracing();
    MockServer::start(ServerConfig::default())
}

#[tokio::test]
async fn every_handshake_returns_a_distinct_client_id() {
    let server = server();
    let mut seen = HashSet::new();
    for _ in 0..10 {
        assert!(seen.insert(handshake_id(&server).await));
    }
    assert_eq!(server.session_count().await.unwrap(), 10);
    server.shutdown().await;
}

#[tokio::test]
async fn handshake_response_carries_negotiation_fields() {
    let server = server();
    let reply = server
        .handshake(Message::handshake().with_id("7"))
        .await
        .unwrap();

    assert_eq!(reply.channel, "/meta/handshake");
    assert_eq!(reply.id.as_deref(), Some("7"));
    assert_eq!(reply.successful, Some(true));
    assert_eq!(reply.version.as_deref(), Some(BAYEUX_VERSION));
    assert_eq!(
        reply.supported_connection_types,
        Some(vec![LONG_POLLING.to_string()])
    );

    let advice = reply.advice.expect("handshake advice");
    assert_eq!(advice.reconnect, Reconnect::Retry);
    assert_eq!(advice.interval, Some(0));
    assert_eq!(advice.timeout, Some(45_000));
    server.shutdown().await;
}

#[tokio::test]
async fn handshake_ignores_incoming_client_id() {
    let server = server();
    let mut request = Message::handshake();
    request.client_id = Some("forged".into());

    let reply = server.handshake(request).await.unwrap();
    assert_eq!(reply.successful, Some(true));
    assert_ne!(reply.client_id.as_deref(), Some("forged"));
    server.shutdown().await;
}

#[tokio::test]
async fn subscribe_echoes_subscription_and_tracks_it() {
    let server = server();
    let client_id = handshake_id(&server).await;

    let reply = server
        .subscribe(Message::subscribe(&client_id, "/foo").with_id("2"))
        .await
        .unwrap();
    assert_eq!(reply.successful, Some(true));
    assert_eq!(reply.subscription.as_deref(), Some("/foo"));
    assert_eq!(reply.id.as_deref(), Some("2"));
    assert_eq!(reply.client_id.as_deref(), Some(client_id.as_str()));

    let snapshot = server.session(&client_id).await.unwrap();
    assert_eq!(snapshot.subscriptions, vec!["/foo".to_string()]);
    server.shutdown().await;
}

#[tokio::test]
async fn unsubscribe_is_idempotent() {
    let server = server();
    let client_id = handshake_id(&server).await;

    server
        .subscribe(Message::subscribe(&client_id, "/foo"))
        .await
        .unwrap();

    // Never subscribed: must not error.
    let reply = server
        .unsubscribe(Message::unsubscribe(&client_id, "/bar"))
        .await
        .unwrap();
    assert_eq!(reply.successful, Some(true));
    assert_eq!(reply.subscription.as_deref(), Some("/bar"));

    let reply = server
        .unsubscribe(Message::unsubscribe(&client_id, "/foo"))
        .await
        .unwrap();
    assert_eq!(reply.successful, Some(true));

    let snapshot = server.session(&client_id).await.unwrap();
    assert!(snapshot.subscriptions.is_empty());
    server.shutdown().await;
}

#[tokio::test]
async fn subscribe_with_unknown_client_advises_rehandshake() {
    let server = server();
    let reply = server
        .subscribe(Message::subscribe("bogus", "/foo"))
        .await
        .unwrap();

    assert_eq!(reply.successful, Some(false));
    let error = reply.error.expect("error descriptor");
    assert!(error.starts_with("401::"), "unexpected error: {error}");
    assert_eq!(
        reply.advice.expect("advice").reconnect,
        Reconnect::Handshake
    );
    server.shutdown().await;
}

#[tokio::test]
async fn disconnect_is_idempotent_in_effect() {
    let server = server();
    let client_id = handshake_id(&server).await;
    assert_eq!(server.session_count().await.unwrap(), 1);

    let reply = server
        .disconnect(Message::disconnect(&client_id))
        .await
        .unwrap();
    assert_eq!(reply.successful, Some(true));
    assert_eq!(server.session_count().await.unwrap(), 0);

    // Already gone: response differs, registry state does not.
    let reply = server
        .disconnect(Message::disconnect(&client_id))
        .await
        .unwrap();
    assert_eq!(reply.successful, Some(false));
    let error = reply.error.expect("error descriptor");
    assert!(error.starts_with("401::"), "unexpected error: {error}");
    assert_eq!(server.session_count().await.unwrap(), 0);
    server.shutdown().await;
}

#[tokio::test]
async fn validation_rejects_connect_without_client_id() {
    let server = server();

    // Channel-correct but missing clientId and connectionType.
    let reply = server
        .connect(Message::new("/meta/connect"))
        .await
        .unwrap();

    assert_eq!(reply.len(), 1);
    assert_eq!(reply[0].successful, Some(false));
    let error = reply[0].error.clone().expect("error descriptor");
    assert!(
        error.starts_with("400::") && error.contains("clientId"),
        "unexpected error: {error}"
    );
    // Never reached the registry.
    assert_eq!(server.session_count().await.unwrap(), 0);
    server.shutdown().await;
}

#[tokio::test]
async fn disabled_validation_lets_the_registry_reject_instead() {
    configure_tracing();
    let config = ServerConfig::builder().no_validation().build().unwrap();
    let server = MockServer::start(config);

    let reply = server
        .connect(Message::new("/meta/connect"))
        .await
        .unwrap();

    // Same message, different failure: the absent clientId reads as an
    // unknown one.
    assert_eq!(reply[0].successful, Some(false));
    let error = reply[0].error.clone().expect("error descriptor");
    assert!(error.starts_with("401::"), "unexpected error: {error}");
    assert_eq!(
        reply[0].advice.expect("advice").reconnect,
        Reconnect::Handshake
    );
    server.shutdown().await;
}

#[tokio::test]
async fn process_routes_by_channel() {
    let server = server();

    let replies = server.process(Message::handshake()).await.unwrap();
    assert_eq!(replies.len(), 1);
    let client_id = replies[0].client_id.clone().expect("clientId");

    let replies = server
        .process(Message::subscribe(&client_id, "/foo"))
        .await
        .unwrap();
    assert_eq!(replies[0].successful, Some(true));

    let replies = server
        .process(Message::disconnect(&client_id))
        .await
        .unwrap();
    assert_eq!(replies[0].successful, Some(true));
    server.shutdown().await;
}

#[tokio::test]
async fn unknown_channel_yields_protocol_error_not_crash() {
    let server = server();
    let replies = server
        .process(Message::new("/service/chat").with_id("9"))
        .await
        .unwrap();

    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].successful, Some(false));
    assert_eq!(replies[0].id.as_deref(), Some("9"));
    let error = replies[0].error.clone().expect("error descriptor");
    assert!(error.starts_with("404::"), "unexpected error: {error}");
    server.shutdown().await;
}

#[tokio::test]
async fn api_fails_cleanly_after_shutdown() {
    let server = server();
    let handle = server.handle();
    server.shutdown().await;

    assert_eq!(
        handle.handshake(Message::handshake()).await.unwrap_err(),
        Error::ServerShutdown
    );
}
