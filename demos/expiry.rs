//! ClientId Expiration Walkthrough
//!
//! Runs a client into a count-based expiration policy and shows the
//! advice that steers it back to a fresh handshake.
//!
//! ```bash
//! cargo run --example expiry
//! ```

use cometd_mock::prelude::*;

#[tokio::main]
async fn main() -> cometd_mock::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let config = ServerConfig::builder()
        .connect_timeout(500)
        .expire_after(2)
        .build()?;
    let server = MockServer::start(config);

    let reply = server.handshake(Message::handshake()).await?;
    let mut client_id = reply.client_id.expect("clientId issued");
    println!("handshake -> clientId {client_id}");

    for round in 1.. {
        let replies = server.connect(Message::connect(&client_id)).await?;
        let reply = replies.last().expect("connect reply");
        let advice = reply.advice.expect("advice");
        println!(
            "connect #{round}: successful={:?} reconnect={:?}",
            reply.successful, advice.reconnect
        );

        if advice.reconnect == Reconnect::Handshake {
            // The clientId expired; do as the server says.
            let reply = server.handshake(Message::handshake()).await?;
            client_id = reply.client_id.expect("fresh clientId");
            println!("re-handshake -> clientId {client_id}");
            break;
        }
    }

    server.shutdown().await;
    Ok(())
}
