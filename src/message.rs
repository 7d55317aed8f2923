//! # Bayeux Message Shapes
//!
//! Parsed wire shapes for Bayeux messages, as exchanged with CometD
//! clients. The JSON envelope codec is the transport's concern; this
//! module models the already-parsed structures the core consumes and
//! produces.
//!
//! ## Key Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Message`] | One Bayeux message (request or response) |
//! | [`MetaChannel`] | Tagged routing enum for the `/meta/*` channels |
//! | [`Advice`] | Server guidance for client retry behavior |
//! | [`Reconnect`] | The `advice.reconnect` directive |
//!
//! Field names serialize in the wire spelling (`clientId`,
//! `supportedConnectionTypes`, ...); absent optional fields are omitted
//! from the serialized form entirely, matching what CometD clients expect.

use serde::{Deserialize, Serialize};

/// The handshake meta channel.
pub const META_HANDSHAKE: &str = "/meta/handshake";
/// The long-poll connect meta channel.
pub const META_CONNECT: &str = "/meta/connect";
/// The disconnect meta channel.
pub const META_DISCONNECT: &str = "/meta/disconnect";
/// The subscribe meta channel.
pub const META_SUBSCRIBE: &str = "/meta/subscribe";
/// The unsubscribe meta channel.
pub const META_UNSUBSCRIBE: &str = "/meta/unsubscribe";

/// Bayeux protocol version advertised in handshake responses.
pub const BAYEUX_VERSION: &str = "1.0";

/// The only connection type this mock supports.
pub const LONG_POLLING: &str = "long-polling";

// ============================================================================
// META CHANNELS
// ============================================================================

/// The meta channels served by this mock.
///
/// Parsed from the wire channel string for routing; anything else is an
/// unknown channel at the protocol level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaChannel {
    Handshake,
    Connect,
    Disconnect,
    Subscribe,
    Unsubscribe,
}

impl MetaChannel {
    /// Parse a wire channel name. Returns `None` for non-meta channels.
    pub fn parse(channel: &str) -> Option<Self> {
        match channel {
            META_HANDSHAKE => Some(Self::Handshake),
            META_CONNECT => Some(Self::Connect),
            META_DISCONNECT => Some(Self::Disconnect),
            META_SUBSCRIBE => Some(Self::Subscribe),
            META_UNSUBSCRIBE => Some(Self::Unsubscribe),
            _ => None,
        }
    }

    /// Get the wire channel name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Handshake => META_HANDSHAKE,
            Self::Connect => META_CONNECT,
            Self::Disconnect => META_DISCONNECT,
            Self::Subscribe => META_SUBSCRIBE,
            Self::Unsubscribe => META_UNSUBSCRIBE,
        }
    }
}

// ============================================================================
// ADVICE
// ============================================================================

/// The `advice.reconnect` directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reconnect {
    /// Retry the connect after `interval` milliseconds.
    #[default]
    Retry,
    /// The clientId is no longer valid; perform a new handshake.
    Handshake,
    /// Stop reconnecting.
    None,
}

/// Server-supplied guidance telling the client how/when to retry.
///
/// `interval` and `timeout` are milliseconds. They are omitted from the
/// wire form when unset (a bare `{"reconnect": "retry"}` is valid advice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advice {
    #[serde(default)]
    pub reconnect: Reconnect,
    /// Milliseconds the client must wait before the next connect attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    /// Milliseconds the server will hold the next connect open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

// ============================================================================
// MESSAGE
// ============================================================================

/// One parsed Bayeux message.
///
/// Covers both requests and responses; which fields are meaningful depends
/// on the channel. The [validator](crate::validator) enforces the
/// per-channel required fields at the boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Message {
    /// Channel the message addresses (always present on the wire).
    pub channel: String,
    /// Message correlation id, echoed back in the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Session identity; required on every channel except handshake.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Response outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub successful: Option<bool>,
    /// Bayeux protocol version (handshake).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Connection types the peer supports (handshake).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_connection_types: Option<Vec<String>>,
    /// Connection type in use (connect).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<String>,
    /// Channel being (un)subscribed, echoed back (subscribe/unsubscribe).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
    /// Retry guidance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advice: Option<Advice>,
    /// Error descriptor (`code::context::tag`) on failed responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Event payload (delivered messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Message {
    /// Create an empty message addressing `channel`.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..Self::default()
        }
    }

    /// A well-formed `/meta/handshake` request.
    pub fn handshake() -> Self {
        Self {
            version: Some(BAYEUX_VERSION.to_string()),
            supported_connection_types: Some(vec![LONG_POLLING.to_string()]),
            ..Self::new(META_HANDSHAKE)
        }
    }

    /// A well-formed `/meta/connect` request for `client_id`.
    pub fn connect(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            connection_type: Some(LONG_POLLING.to_string()),
            ..Self::new(META_CONNECT)
        }
    }

    /// A well-formed `/meta/disconnect` request for `client_id`.
    pub fn disconnect(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..Self::new(META_DISCONNECT)
        }
    }

    /// A well-formed `/meta/subscribe` request.
    pub fn subscribe(client_id: impl Into<String>, subscription: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            subscription: Some(subscription.into()),
            ..Self::new(META_SUBSCRIBE)
        }
    }

    /// A well-formed `/meta/unsubscribe` request.
    pub fn unsubscribe(client_id: impl Into<String>, subscription: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            subscription: Some(subscription.into()),
            ..Self::new(META_UNSUBSCRIBE)
        }
    }

    /// An event message carrying `data` on a non-meta channel, for
    /// [`deliver`](crate::server::ServerHandle::deliver).
    pub fn event(channel: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            ..Self::new(channel)
        }
    }

    /// Set the correlation id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Whether this is a successful response.
    pub fn is_successful(&self) -> bool {
        self.successful == Some(true)
    }
}
