//! # Commands (Internal)
//!
//! This module defines the [`Command`] enum used for communication between
//! user-facing handles and the server's event loop. It is `pub(crate)` —
//! internal to the library.
//!
//! ## Design Pattern
//!
//! Handles don't touch state directly. Instead, they send [`Command`]
//! messages through an MPSC channel to the server task, which processes
//! them atomically:
//!
//! ```text
//! ┌──────────────┐      Command channel      ┌─────────────────┐
//! │ ServerHandle │ ────────────────────────▶ │   Server Task   │
//! │  MockServer  │   cmd_tx.send(Command)    │   (Event Loop)  │
//! └──────────────┘                           └─────────────────┘
//! ```
//!
//! ## Command Categories
//!
//! | Category | Commands | Description |
//! |----------|----------|-------------|
//! | Meta channels | `Handshake`, `Connect`, `Disconnect`, `Subscribe`, `Unsubscribe` | One per Bayeux meta channel |
//! | Injection | `Deliver` | Resolve/queue an event for a client |
//! | Inspection | `SessionCount`, `Inspect` | Registry observation for tests |
//! | Lifecycle | `Shutdown` | Drain holds and stop the task |
//!
//! ## Response Pattern
//!
//! Every command that answers carries a `oneshot::Sender`; the event loop
//! sends the result through it when done. `Connect` answers with a `Vec`
//! because a released hold may carry queued event messages ahead of the
//! connect response itself.

use tokio::sync::oneshot;

use crate::error::Result;
use crate::message::Message;
use crate::session::SessionSnapshot;

/// Commands sent from handles to the server task
pub(crate) enum Command {
    /// Process a `/meta/handshake` message
    Handshake {
        message: Message,
        respond: oneshot::Sender<Message>,
    },
    /// Process a `/meta/connect` message (the only held operation)
    Connect {
        message: Message,
        respond: oneshot::Sender<Vec<Message>>,
    },
    /// Process a `/meta/disconnect` message
    Disconnect {
        message: Message,
        respond: oneshot::Sender<Message>,
    },
    /// Process a `/meta/subscribe` message
    Subscribe {
        message: Message,
        respond: oneshot::Sender<Message>,
    },
    /// Process a `/meta/unsubscribe` message
    Unsubscribe {
        message: Message,
        respond: oneshot::Sender<Message>,
    },
    /// Inject an event for a client: resolves an outstanding connect hold
    /// immediately, or queues for the next connect
    Deliver {
        client_id: String,
        event: Message,
        respond: oneshot::Sender<Result<()>>,
    },
    /// Number of live sessions in the registry
    SessionCount { respond: oneshot::Sender<usize> },
    /// Snapshot of a single session's observable state
    Inspect {
        client_id: String,
        respond: oneshot::Sender<Result<SessionSnapshot>>,
    },
    /// Shutdown the server task, draining outstanding holds first
    Shutdown,
}

/// How an outstanding connect hold was released.
///
/// Sent through the hold's oneshot channel by whoever releases it; the
/// hold future forwards it to the event loop for response building.
#[derive(Debug)]
pub(crate) enum HoldRelease {
    /// Events were delivered for this client; respond with them now.
    Deliver(Vec<Message>),
    /// The session expired while the hold was outstanding.
    Expired,
    /// The client disconnected while the hold was outstanding.
    Disconnected,
    /// The server is shutting down; respond as an idle long-poll return.
    Shutdown,
}
