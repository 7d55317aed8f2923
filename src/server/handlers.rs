//! # Meta Channel Handlers (Internal)
//!
//! One handler per Bayeux meta channel, each composing the validator, the
//! session registry, and the advice generator into a response message.
//! `pub(crate)` — internal to the library.
//!
//! | Handler | Channel | Notes |
//! |---------|---------|-------|
//! | [`handshake`] | `/meta/handshake` | Always creates a new session |
//! | [`connect`] | `/meta/connect` | May register a hold instead of responding |
//! | [`disconnect`] | `/meta/disconnect` | Releases an outstanding hold |
//! | [`subscribe`] / [`unsubscribe`] | `/meta/subscribe`, `/meta/unsubscribe` | Echo `subscription` |
//! | [`complete_connect`] | — | Builds the response when a hold resolves |
//! | [`deliver`] | — | Early-release injection point |
//! | [`sweep_expired`] | — | Periodic time-based expiry |
//!
//! Handlers never fail: protocol errors become well-formed responses with
//! `successful: false` and an `error` descriptor. They are synchronous and
//! mutate `&mut ServerState`; anything that must wait (the connect hold)
//! is handed back to the event loop as a [`ConnectDisposition`].

use tokio::sync::oneshot;
use tokio::time::Instant;

use super::state::{HoldOutcome, ServerState};
use crate::advice;
use crate::command::HoldRelease;
use crate::config::ReconnectPolicy;
use crate::error::{Error, Result};
use crate::message::{
    Advice, Message, MetaChannel, BAYEUX_VERSION, LONG_POLLING, META_CONNECT,
};
use crate::session::{ConnectHold, SessionSnapshot};

// ============================================================================
// RESPONSE BUILDERS
// ============================================================================

/// Successful response skeleton: channel, echoed id, clientId.
fn ok_reply(channel: &str, id: Option<String>, client_id: Option<String>) -> Message {
    Message {
        id,
        client_id,
        successful: Some(true),
        ..Message::new(channel)
    }
}

/// Failed response skeleton with the error descriptor and optional advice.
fn error_reply(
    channel: &str,
    id: Option<String>,
    client_id: Option<String>,
    error: &Error,
    advice: Option<Advice>,
) -> Message {
    tracing::debug!("{channel} failed: {error}");
    Message {
        id,
        client_id,
        successful: Some(false),
        error: Some(error.bayeux_error()),
        advice,
        ..Message::new(channel)
    }
}

/// The advice attached to a lookup failure: re-handshake when the session
/// is gone, nothing otherwise.
fn failure_advice(state: &ServerState, error: &Error) -> Option<Advice> {
    error
        .wants_rehandshake()
        .then(|| advice::rehandshake(&state.config))
}

/// Response for a message addressing a channel this server does not serve.
pub(crate) fn unknown_channel_reply(message: &Message) -> Message {
    let error = Error::UnknownChannel {
        channel: message.channel.clone(),
    };
    error_reply(
        &message.channel,
        message.id.clone(),
        message.client_id.clone(),
        &error,
        None,
    )
}

// ============================================================================
// HANDSHAKE
// ============================================================================

/// Handle `/meta/handshake`: any incoming clientId is ignored, a new
/// session is always created.
pub(crate) fn handshake(state: &mut ServerState, message: Message) -> Message {
    if let Err(error) = state.validator.validate(MetaChannel::Handshake, &message) {
        return error_reply(&message.channel, message.id, None, &error, Some(advice::none()));
    }

    let client_id = state.registry.create_session();
    tracing::debug!("handshake complete for {client_id}");

    Message {
        version: Some(BAYEUX_VERSION.to_string()),
        supported_connection_types: Some(vec![LONG_POLLING.to_string()]),
        advice: Some(advice::baseline(&state.config)),
        ..ok_reply(&message.channel, message.id, Some(client_id))
    }
}

// ============================================================================
// CONNECT
// ============================================================================

/// What the event loop should do with a `/meta/connect`.
pub(crate) enum ConnectDisposition {
    /// Respond immediately.
    Respond(Vec<Message>),
    /// A hold was registered; the loop owns the timeout.
    Hold {
        client_id: String,
        message_id: Option<String>,
        release_rx: oneshot::Receiver<HoldRelease>,
    },
}

/// Handle `/meta/connect` up to the suspension point.
pub(crate) fn connect(state: &mut ServerState, message: Message) -> ConnectDisposition {
    if let Err(error) = state.validator.validate(MetaChannel::Connect, &message) {
        return ConnectDisposition::Respond(vec![error_reply(
            &message.channel,
            message.id,
            message.client_id,
            &error,
            Some(advice::none()),
        )]);
    }

    let client_id = message.client_id.clone().unwrap_or_default();
    let message_id = message.id.clone();

    if let Err(error) = state.registry.lookup(&client_id) {
        let advice = failure_advice(state, &error);
        return ConnectDisposition::Respond(vec![error_reply(
            META_CONNECT,
            message_id,
            Some(client_id),
            &error,
            advice,
        )]);
    }

    let holding = state
        .registry
        .lookup(&client_id)
        .map(|session| session.is_holding())
        .unwrap_or(false);
    if holding {
        let error = Error::ConcurrentConnect {
            client_id: client_id.clone(),
        };
        return ConnectDisposition::Respond(vec![error_reply(
            META_CONNECT,
            message_id,
            Some(client_id),
            &error,
            Some(advice::baseline(&state.config)),
        )]);
    }

    if forced_reconnect_due(state, &client_id) {
        tracing::debug!("forcing reconnect for {client_id}");
        return ConnectDisposition::Respond(vec![Message {
            advice: Some(advice::forced_retry()),
            ..ok_reply(META_CONNECT, message_id, Some(client_id))
        }]);
    }

    // Anything queued releases the connect immediately instead of holding.
    let queued: Vec<Message> = match state.registry.lookup_mut(&client_id) {
        Ok(session) => session.queued_events.drain(..).collect(),
        Err(_) => Vec::new(),
    };
    if !queued.is_empty() {
        return ConnectDisposition::Respond(finish_connect(state, &client_id, message_id, queued));
    }

    let (release_tx, release_rx) = oneshot::channel();
    if let Ok(session) = state.registry.lookup_mut(&client_id) {
        session.pending_connect = Some(ConnectHold { release: release_tx });
    }
    tracing::trace!("holding connect for {client_id}");

    ConnectDisposition::Hold {
        client_id,
        message_id,
        release_rx,
    }
}

/// Build the final response once a hold resolves (or a connect releases
/// without ever holding). Touch happens here: `last_seen_at` and
/// `connection_count` update on every normal release, and the expiration
/// policy may convert the release into a re-handshake response.
pub(crate) fn complete_connect(
    state: &mut ServerState,
    client_id: &str,
    message_id: Option<String>,
    outcome: HoldOutcome,
) -> Vec<Message> {
    match outcome {
        HoldOutcome::Timeout => {
            if let Ok(session) = state.registry.lookup_mut(client_id) {
                session.pending_connect = None;
            }
            finish_connect(state, client_id, message_id, Vec::new())
        }
        HoldOutcome::Released(HoldRelease::Deliver(events)) => {
            finish_connect(state, client_id, message_id, events)
        }
        HoldOutcome::Released(HoldRelease::Expired) => {
            let error = Error::ClientExpired {
                client_id: client_id.to_string(),
            };
            vec![error_reply(
                META_CONNECT,
                message_id,
                Some(client_id.to_string()),
                &error,
                Some(advice::rehandshake(&state.config)),
            )]
        }
        HoldOutcome::Released(HoldRelease::Disconnected) => {
            // The client asked to leave; complete the poll and stop it
            // from reconnecting.
            vec![Message {
                advice: Some(advice::none()),
                ..ok_reply(META_CONNECT, message_id, Some(client_id.to_string()))
            }]
        }
        HoldOutcome::Released(HoldRelease::Shutdown) => {
            vec![Message {
                advice: Some(advice::baseline(&state.config)),
                ..ok_reply(META_CONNECT, message_id, Some(client_id.to_string()))
            }]
        }
    }
}

/// Touch the session and assemble `events + connect response`, degrading
/// to a re-handshake response when the touch trips the expiration policy.
fn finish_connect(
    state: &mut ServerState,
    client_id: &str,
    message_id: Option<String>,
    mut events: Vec<Message>,
) -> Vec<Message> {
    // Drop the session borrow before the arms re-borrow `state`.
    match state.registry.touch(client_id).map(|_| ()) {
        Ok(()) => {
            events.push(Message {
                advice: Some(advice::baseline(&state.config)),
                ..ok_reply(META_CONNECT, message_id, Some(client_id.to_string()))
            });
            events
        }
        Err(error) => {
            let advice = failure_advice(state, &error);
            vec![error_reply(
                META_CONNECT,
                message_id,
                Some(client_id.to_string()),
                &error,
                advice,
            )]
        }
    }
}

/// Whether the forced-reconnect policy fires for this connect. Firing
/// resets the session's counters, so the next connects are held normally.
fn forced_reconnect_due(state: &mut ServerState, client_id: &str) -> bool {
    let Some(policy) = state.config.reconnect_policy else {
        return false;
    };
    let Ok(session) = state.registry.lookup_mut(client_id) else {
        return false;
    };
    match policy {
        ReconnectPolicy::AfterConnects(threshold) => {
            if session.connection_count >= threshold {
                session.connection_count = 1;
                true
            } else {
                false
            }
        }
        ReconnectPolicy::AfterElapsed(window) => {
            if session.reconnect_epoch.elapsed() >= window {
                session.reconnect_epoch = Instant::now();
                session.connection_count = 1;
                true
            } else {
                false
            }
        }
    }
}

// ============================================================================
// DISCONNECT
// ============================================================================

/// Handle `/meta/disconnect`. Removes the session and releases any
/// outstanding hold; responds `successful: true` whenever the session
/// existed at call time.
pub(crate) fn disconnect(state: &mut ServerState, message: Message) -> Message {
    if let Err(error) = state.validator.validate(MetaChannel::Disconnect, &message) {
        return error_reply(
            &message.channel,
            message.id,
            message.client_id,
            &error,
            Some(advice::none()),
        );
    }

    let client_id = message.client_id.clone().unwrap_or_default();

    match state.registry.remove(&client_id) {
        Some(mut session) => {
            if let Some(hold) = session.pending_connect.take() {
                let _ = hold.release.send(HoldRelease::Disconnected);
            }
            tracing::debug!("disconnected {client_id}");
            ok_reply(&message.channel, message.id, Some(client_id))
        }
        None => {
            let error = state.registry.absence_error(&client_id);
            error_reply(
                &message.channel,
                message.id,
                Some(client_id),
                &error,
                Some(advice::none()),
            )
        }
    }
}

// ============================================================================
// SUBSCRIBE / UNSUBSCRIBE
// ============================================================================

/// Handle `/meta/subscribe`.
pub(crate) fn subscribe(state: &mut ServerState, message: Message) -> Message {
    mutate_subscription(state, message, MetaChannel::Subscribe)
}

/// Handle `/meta/unsubscribe`. Idempotent: succeeds even when the channel
/// was never subscribed.
pub(crate) fn unsubscribe(state: &mut ServerState, message: Message) -> Message {
    mutate_subscription(state, message, MetaChannel::Unsubscribe)
}

fn mutate_subscription(
    state: &mut ServerState,
    message: Message,
    channel: MetaChannel,
) -> Message {
    if let Err(error) = state.validator.validate(channel, &message) {
        return error_reply(
            &message.channel,
            message.id,
            message.client_id,
            &error,
            Some(advice::none()),
        );
    }

    let client_id = message.client_id.clone().unwrap_or_default();
    let subscription = message.subscription.clone().unwrap_or_default();

    let result = match channel {
        MetaChannel::Subscribe => state.registry.subscribe(&client_id, &subscription),
        _ => state.registry.unsubscribe(&client_id, &subscription),
    };

    match result {
        Ok(()) => Message {
            subscription: Some(subscription),
            ..ok_reply(&message.channel, message.id, Some(client_id))
        },
        Err(error) => {
            let advice = failure_advice(state, &error);
            Message {
                subscription: Some(subscription),
                ..error_reply(&message.channel, message.id, Some(client_id), &error, advice)
            }
        }
    }
}

// ============================================================================
// DELIVERY AND EXPIRY
// ============================================================================

/// Inject an event for `client_id`: resolves an outstanding hold
/// immediately, otherwise queues for the next connect.
pub(crate) fn deliver(state: &mut ServerState, client_id: &str, event: Message) -> Result<()> {
    let session = state.registry.lookup_mut(client_id)?;
    if let Some(hold) = session.pending_connect.take() {
        // The hold future may have timed out between the deadline and our
        // send; the rejected payload falls back to the queue.
        if let Err(HoldRelease::Deliver(events)) =
            hold.release.send(HoldRelease::Deliver(vec![event]))
        {
            session.queued_events.extend(events);
        }
    } else {
        session.queued_events.push_back(event);
    }
    Ok(())
}

/// Remove time-expired sessions, releasing their holds with a
/// re-handshake response. No-op unless the time-based policy is active.
pub(crate) fn sweep_expired(state: &mut ServerState) {
    let now = Instant::now();
    for client_id in state.registry.time_expired_ids(now) {
        if let Some(mut session) = state.registry.expire(&client_id) {
            if let Some(hold) = session.pending_connect.take() {
                let _ = hold.release.send(HoldRelease::Expired);
            }
        }
    }
}

/// Snapshot a session for the inspection API.
pub(crate) fn inspect(state: &ServerState, client_id: &str) -> Result<SessionSnapshot> {
    state
        .registry
        .lookup(client_id)
        .map(|session| session.snapshot())
}
