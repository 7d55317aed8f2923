//! # cometd-mock
//!
//! A **mock CometD/Bayeux server core** for [tokio](https://tokio.rs),
//! built to exercise real long-polling clients against realistic server
//! timing and failure semantics without a full production CometD
//! deployment.
//!
//! The Bayeux protocol's meta channels (`/meta/handshake`,
//! `/meta/connect`, `/meta/subscribe`, `/meta/unsubscribe`,
//! `/meta/disconnect`) carry session management: a client obtains a
//! `clientId` via handshake, then keeps a `/meta/connect` request held
//! open at the server (the long poll) until there is something to deliver
//! or a timeout elapses. This crate implements that session and
//! connect-cycle state machine; HTTP transport and JSON envelope codecs
//! stay with the embedding test harness.
//!
//! ## Features
//!
//! - **Handshake negotiation**: fresh UUID clientIds, protocol version and
//!   connection-type negotiation fields
//! - **Long-poll connect cycle**: holds released by timeout, delivered
//!   events, session expiry, or disconnect — never leaked
//! - **Reconnection advice**: `retry` / `handshake` / `none` with
//!   configurable `interval` and `timeout`
//! - **ClientId lifecycle**: count-based or time-based expiration,
//!   forced-reconnect policies
//! - **Message validation**: per-channel required-field checks, disableable
//!
//! ## Quick Start
//!
//! ```no_run
//! use cometd_mock::{Message, MockServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> cometd_mock::Result<()> {
//!     let config = ServerConfig::builder()
//!         .connect_timeout(5_000)
//!         .expire_after(10)
//!         .build()?;
//!     let server = MockServer::start(config);
//!
//!     let reply = server.handshake(Message::handshake()).await?;
//!     let client_id = reply.client_id.expect("clientId issued");
//!
//!     server.subscribe(Message::subscribe(&client_id, "/foo")).await?;
//!
//!     // Held for up to 5 seconds, or until an event is delivered.
//!     let replies = server.connect(Message::connect(&client_id)).await?;
//!     println!("connect returned {} message(s)", replies.len());
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ---
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Test Harness / Transport                   │
//! │   ┌────────────┐                     ┌────────────────┐     │
//! │   │ MockServer │                     │ ServerHandle(s)│     │
//! │   └──────┬─────┘                     └───────┬────────┘     │
//! └──────────┼───────────────────────────────────┼──────────────┘
//!            │ Commands                          │ Commands
//!            ▼                                   ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Server Task (Event Loop)                  │
//! │   ┌───────────────────────────────────────────────────┐     │
//! │   │                  ServerState                      │     │
//! │   │   • registry: SessionRegistry                     │     │
//! │   │   • validator, config                             │     │
//! │   └───────────────────────────────────────────────────┘     │
//! │                                                             │
//! │   Event Loop (select!):                                     │
//! │     • Command channel (from handles)                        │
//! │     • Connect holds (FuturesUnordered, one per session)     │
//! │     • Periodic timer (time-based expiry sweep)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Visibility | Responsibility |
//! |--------|------------|----------------|
//! | [`server`] | Public | Event loop executor, [`MockServer`], [`ServerHandle`] |
//! | [`message`] | Public | Parsed wire shapes: [`Message`], [`Advice`], [`MetaChannel`] |
//! | [`session`] | Public | [`SessionRegistry`], [`Session`], expiration policies |
//! | [`validator`] | Public | Required-field validation per meta channel |
//! | [`advice`] | Public | Advice generation (pure functions of config) |
//! | [`config`] | Public | [`ServerConfig`] and lifecycle policies |
//! | [`error`] | Public | Error types: [`Error`], [`Result`] |
//! | `command` | Internal | Command enum for handle→task communication |
//!
//! ## Key Concepts
//!
//! ### The Server Task as State Machine Executor
//!
//! All mutable state lives in one place, owned by a single task. Handles
//! send commands and await oneshot replies; the event loop processes them
//! atomically. This eliminates data races without locks and keeps every
//! registry operation bounded — no connect hold ever blocks another
//! client's handshake, touch, or removal.
//!
//! ### Connect Holds
//!
//! A held `/meta/connect` is a future racing a release channel against
//! `connect_timeout`. Exactly one of four things resolves it:
//!
//! | Release | Response |
//! |---------|----------|
//! | Timeout | `successful: true`, baseline advice (idle long poll) |
//! | Delivered event | event message(s) + `successful: true` |
//! | Session expiry | `successful: false`, `reconnect: handshake` |
//! | Disconnect | `successful: true`, `reconnect: none` |
//!
//! ### ClientId Expiration
//!
//! Configured as *either* a connect-count threshold *or* a time threshold
//! (never both). A count threshold of N admits exactly N completed
//! connects; the (N+1)th fails with `ClientExpired` and the registry
//! remembers the id so later lookups report the expiry rather than an
//! unknown client.

pub mod advice;
pub mod config;
pub mod error;
pub mod message;
pub mod server;
pub mod session;
pub mod validator;

pub(crate) mod command;

pub use config::{ExpirePolicy, ReconnectPolicy, ServerConfig, ServerConfigBuilder};
pub use error::{ConfigError, Error, Result};
pub use message::{Advice, Message, MetaChannel, Reconnect};
pub use server::{MockServer, ServerHandle};
pub use session::{Session, SessionRegistry, SessionSnapshot, SessionState};
pub use validator::Validator;

pub mod prelude {
    //! Convenience re-exports for tests and demos.
    pub use crate::{
        Advice, Error, Message, MetaChannel, MockServer, Reconnect, Result, ServerConfig,
        ServerHandle, SessionState,
    };
}
