//! Basic Connect-Cycle Walkthrough
//!
//! Drives one full client lifecycle against the mock: handshake,
//! subscribe, a long-poll released early by a delivered event, an idle
//! long-poll running to its timeout, and disconnect.
//!
//! ```bash
//! cargo run --example basic_cycle
//! ```

use std::time::Duration;

use cometd_mock::prelude::*;

#[tokio::main]
async fn main() -> cometd_mock::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let config = ServerConfig::builder().connect_timeout(2_000).build()?;
    let server = MockServer::start(config);

    let reply = server.handshake(Message::handshake().with_id("1")).await?;
    let client_id = reply.client_id.expect("clientId issued");
    println!("handshake -> clientId {client_id}");

    let reply = server
        .subscribe(Message::subscribe(&client_id, "/demo").with_id("2"))
        .await?;
    println!("subscribed to {}", reply.subscription.expect("echoed"));

    // Deliver an event into the held poll from a second handle.
    let handle = server.handle();
    let target = client_id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle
            .deliver(&target, Message::event("/demo", serde_json::json!({"tick": 1})))
            .await
            .expect("deliver");
    });

    let replies = server.connect(Message::connect(&client_id).with_id("3")).await?;
    println!("connect released early with {} message(s):", replies.len());
    for msg in &replies {
        println!("  {}", serde_json::to_string(msg).expect("serialize"));
    }

    // Nothing queued now: this poll runs to its 2 second timeout.
    let replies = server.connect(Message::connect(&client_id).with_id("4")).await?;
    println!(
        "idle connect returned successful={:?}",
        replies[0].successful
    );

    let reply = server
        .disconnect(Message::disconnect(&client_id).with_id("5"))
        .await?;
    println!("disconnect successful={:?}", reply.successful);

    server.shutdown().await;
    Ok(())
}
