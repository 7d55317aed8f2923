//! # Server State (Internal)
//!
//! The central state structure used by the server's event loop. It is
//! `pub(crate)` — internal to the library.
//!
//! All mutable state lives in [`ServerState`]. The event loop owns this
//! structure exclusively, avoiding the need for locks or atomic
//! operations. Handler functions in [`handlers`](super::handlers) take
//! `&mut ServerState` and return fully-built response messages for the
//! event loop to dispatch.

use tokio::sync::oneshot;

use crate::command::HoldRelease;
use crate::config::ServerConfig;
use crate::message::Message;
use crate::session::SessionRegistry;
use crate::validator::Validator;

/// State owned by the server task.
pub(crate) struct ServerState {
    pub(crate) config: ServerConfig,
    pub(crate) registry: SessionRegistry,
    pub(crate) validator: Validator,
}

impl ServerState {
    pub(crate) fn new(config: ServerConfig) -> Self {
        let registry = SessionRegistry::new(config.expire_policy);
        let validator = Validator::new(config.validation);
        Self {
            config,
            registry,
            validator,
        }
    }
}

/// A completed connect hold, yielded by the hold future.
///
/// Carries everything the event loop needs to build and send the final
/// response: the session, the request's correlation id, the transport's
/// respond channel, and how the hold was released.
pub(crate) struct HeldConnect {
    pub(crate) client_id: String,
    pub(crate) message_id: Option<String>,
    pub(crate) respond: oneshot::Sender<Vec<Message>>,
    pub(crate) outcome: HoldOutcome,
}

/// How a hold future completed.
#[derive(Debug)]
pub(crate) enum HoldOutcome {
    /// The deadline elapsed with nothing to deliver — the normal CometD
    /// idle long-poll return.
    Timeout,
    /// Released early through the session's release handle.
    Released(HoldRelease),
}
