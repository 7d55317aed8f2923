//! # Mock Server
//!
//! The mock server is the **central coordinator** for the Bayeux session
//! and connect-cycle state machine. It owns the session registry and
//! dispatches messages from the transport layer.
//!
//! ## Role in the Architecture
//!
//! The server implements an **event loop pattern** where:
//!
//! 1. All state lives in a single `ServerState` struct
//! 2. Handles send `Command` messages via channels
//! 3. The event loop processes commands and hold completions in a
//!    `tokio::select!` loop
//! 4. Responses flow back through oneshot channels
//!
//! This design ensures **thread-safety without locks** (single-owner event
//! loop): registry operations from different clients are serialized and
//! bounded, while each connect hold suspends independently without
//! blocking anyone.
//!
//! ## Lifetime and Shutdown
//!
//! The server task runs until [`MockServer::shutdown`] is called or the
//! [`MockServer`] is dropped (the command channel closes). Either way,
//! outstanding connect holds are drained before the task exits — no
//! long-poll is ever left dangling.

use tokio::sync::{mpsc, oneshot};

use crate::command::Command;
use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::message::{Message, MetaChannel};
use crate::session::SessionSnapshot;

pub(crate) mod event_loop;
pub(crate) mod handlers;
pub(crate) mod state;

use event_loop::server_task;
use state::ServerState;

// ============================================================================
// SERVER HANDLE
// ============================================================================

/// Cheap, cloneable handle to a running [`MockServer`].
///
/// All operations send a command to the server task and await the reply.
/// Clone it freely to drive the server from several tasks at once (e.g. a
/// held connect on one task and a `deliver` on another).
#[derive(Debug, Clone)]
pub struct ServerHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl ServerHandle {
    async fn call<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| Error::ServerShutdown)?;
        rx.await.map_err(|_| Error::ServerShutdown)
    }

    /// Process a parsed message, routed by its channel.
    ///
    /// Non-meta channels yield a `404 unknown_channel` response. Returns
    /// `Err` only when the server task is gone.
    pub async fn process(&self, message: Message) -> Result<Vec<Message>> {
        match MetaChannel::parse(&message.channel) {
            Some(MetaChannel::Handshake) => Ok(vec![self.handshake(message).await?]),
            Some(MetaChannel::Connect) => self.connect(message).await,
            Some(MetaChannel::Disconnect) => Ok(vec![self.disconnect(message).await?]),
            Some(MetaChannel::Subscribe) => Ok(vec![self.subscribe(message).await?]),
            Some(MetaChannel::Unsubscribe) => Ok(vec![self.unsubscribe(message).await?]),
            None => {
                tracing::debug!("unknown channel: {}", message.channel);
                Ok(vec![handlers::unknown_channel_reply(&message)])
            }
        }
    }

    /// Process a `/meta/handshake` message. Always issues a fresh clientId.
    pub async fn handshake(&self, message: Message) -> Result<Message> {
        self.call(|respond| Command::Handshake { message, respond })
            .await
    }

    /// Process a `/meta/connect` message.
    ///
    /// This is the long-poll: the future resolves when the hold is
    /// released — by timeout (at most `connect_timeout`), by a delivered
    /// event, by session expiry, or by disconnect. The reply may carry
    /// event messages ahead of the connect response itself.
    pub async fn connect(&self, message: Message) -> Result<Vec<Message>> {
        self.call(|respond| Command::Connect { message, respond })
            .await
    }

    /// Process a `/meta/disconnect` message.
    pub async fn disconnect(&self, message: Message) -> Result<Message> {
        self.call(|respond| Command::Disconnect { message, respond })
            .await
    }

    /// Process a `/meta/subscribe` message.
    pub async fn subscribe(&self, message: Message) -> Result<Message> {
        self.call(|respond| Command::Subscribe { message, respond })
            .await
    }

    /// Process a `/meta/unsubscribe` message.
    pub async fn unsubscribe(&self, message: Message) -> Result<Message> {
        self.call(|respond| Command::Unsubscribe { message, respond })
            .await
    }

    /// Inject an event for `client_id`.
    ///
    /// Resolves an outstanding connect hold immediately; with no hold
    /// outstanding the event is queued and the next connect returns it
    /// without holding. Fails when the clientId is unknown or expired.
    pub async fn deliver(&self, client_id: impl Into<String>, event: Message) -> Result<()> {
        let client_id = client_id.into();
        self.call(|respond| Command::Deliver {
            client_id,
            event,
            respond,
        })
        .await?
    }

    /// Number of live sessions in the registry.
    pub async fn session_count(&self) -> Result<usize> {
        self.call(|respond| Command::SessionCount { respond }).await
    }

    /// Snapshot of a single session's observable state.
    ///
    /// Fails with `UnknownClient`/`ClientExpired` like any other lookup.
    pub async fn session(&self, client_id: impl Into<String>) -> Result<SessionSnapshot> {
        let client_id = client_id.into();
        self.call(|respond| Command::Inspect { client_id, respond })
            .await?
    }
}

// ============================================================================
// MOCK SERVER
// ============================================================================

/// A running Bayeux mock server.
///
/// Create one per test; it spawns a background task owning all session
/// state. The transport layer (out of scope here) feeds it parsed
/// messages via [`process`](ServerHandle::process) or the per-channel
/// entry points, all available directly on the server or on cloned
/// [`ServerHandle`]s.
///
/// # Example
///
/// ```no_run
/// use cometd_mock::{Message, MockServer, ServerConfig};
///
/// # async fn example() -> cometd_mock::Result<()> {
/// let server = MockServer::start(ServerConfig::default());
///
/// let reply = server.handshake(Message::handshake()).await?;
/// let client_id = reply.client_id.expect("clientId issued");
///
/// // Long-poll: held for up to `connect_timeout`.
/// let replies = server.connect(Message::connect(&client_id)).await?;
/// assert!(replies.last().expect("connect reply").is_successful());
///
/// server.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct MockServer {
    handle: ServerHandle,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl MockServer {
    /// Start the server task with the given configuration.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(config: ServerConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let state = ServerState::new(config);
        let task = tokio::spawn(server_task(state, cmd_rx));
        Self {
            handle: ServerHandle { cmd_tx },
            task: Some(task),
        }
    }

    /// Get a cloneable handle for driving the server from other tasks.
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Gracefully shut down the server.
    ///
    /// Outstanding connect holds are released (as idle long-poll returns)
    /// before the task exits. Dropping the server without calling this
    /// triggers the same drain, but without waiting for it to finish.
    pub async fn shutdown(mut self) {
        let _ = self.handle.cmd_tx.send(Command::Shutdown).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl std::ops::Deref for MockServer {
    type Target = ServerHandle;

    fn deref(&self) -> &ServerHandle {
        &self.handle
    }
}
