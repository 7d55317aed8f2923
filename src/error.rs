//! # Error Types
//!
//! This module defines all error types used throughout the library.
//!
//! ## Error Hierarchy
//!
//! The main [`Error`] enum covers all possible failure modes:
//!
//! | Variant | Cause | Recoverable? |
//! |---------|-------|--------------|
//! | [`Error::MalformedMessage`] | Required field missing/mistyped | Yes (fix the message) |
//! | [`Error::UnknownClient`] | clientId not in the registry | Yes (re-handshake) |
//! | [`Error::ClientExpired`] | clientId invalidated by expiration policy | Yes (re-handshake) |
//! | [`Error::ConcurrentConnect`] | Second connect while one is held | Yes (wait for the first) |
//! | [`Error::TooSoon`] | Connect before the advised interval | Yes (back off) |
//! | [`Error::UnknownChannel`] | Message addressed a channel we don't serve | Yes (fix the channel) |
//! | [`Error::Config`] | Invalid configuration | No (fix config) |
//! | [`Error::ServerShutdown`] | The server task is gone | No (restart) |
//!
//! Protocol-level errors never terminate a connection: the meta channel
//! handlers convert them into well-formed Bayeux responses with
//! `successful: false` and an `error` descriptor (see
//! [`Error::bayeux_error`]). Only [`Error::ServerShutdown`] surfaces as an
//! `Err` from the public API.
//!
//! ## Bayeux Error Descriptors
//!
//! The wire-level `error` field follows the CometD convention
//! `code::context::tag`, e.g. `401::51a8b2::unknown_client_id`.

use std::fmt;

/// Result type alias using the library's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for all library operations.
///
/// This enum covers all possible failure modes. Use pattern matching
/// to handle specific error cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A required field is missing or has the wrong type for its channel.
    ///
    /// Produced by the message validator before the message reaches the
    /// session registry. Disabled validation skips this check entirely.
    MalformedMessage {
        /// Channel of the offending message.
        channel: String,
        /// Name of the missing/malformed wire field (e.g. `clientId`).
        field: &'static str,
    },

    /// The clientId is not known to the session registry.
    ///
    /// The client never handshook, or disconnected. The response advises
    /// `reconnect: handshake`.
    UnknownClient {
        /// The clientId that failed the lookup.
        client_id: String,
    },

    /// The clientId was invalidated by the configured expiration policy.
    ///
    /// Distinct from [`Error::UnknownClient`]: the registry remembers
    /// recently expired ids. The response advises `reconnect: handshake`.
    ClientExpired {
        /// The expired clientId.
        client_id: String,
    },

    /// A `/meta/connect` arrived while another one is already held.
    ///
    /// A session may never have two outstanding connect holds. The first
    /// hold is unaffected.
    ConcurrentConnect {
        /// The clientId with the outstanding hold.
        client_id: String,
    },

    /// Reserved: a connect arrived before `lastSeenAt + connect-interval`.
    ///
    /// The interval is advisory and not enforced by default; this variant
    /// exists so server-side enforcement can be added without an API break.
    TooSoon {
        /// The clientId that reconnected early.
        client_id: String,
    },

    /// The message addressed a channel this server does not serve.
    UnknownChannel {
        /// The unrecognized channel name.
        channel: String,
    },

    /// Configuration error (conflicting policy axes, etc.).
    ///
    /// Indicates a problem with the provided
    /// [`ServerConfig`](crate::config::ServerConfig). Fix the configuration
    /// and restart.
    Config(ConfigError),

    /// The server task has shut down.
    ///
    /// Occurs when the [`MockServer`](crate::MockServer) was shut down or
    /// dropped while operations are pending.
    ServerShutdown,
}

impl Error {
    /// Render the error as a Bayeux `error` field value (`code::context::tag`).
    pub fn bayeux_error(&self) -> String {
        match self {
            Self::MalformedMessage { channel, field } => {
                format!("400::{channel},{field}::malformed_message")
            }
            Self::UnknownClient { client_id } => {
                format!("401::{client_id}::unknown_client_id")
            }
            Self::ClientExpired { client_id } => {
                format!("402::{client_id}::client_id_expired")
            }
            Self::UnknownChannel { channel } => {
                format!("404::{channel}::unknown_channel")
            }
            Self::ConcurrentConnect { client_id } => {
                format!("409::{client_id}::concurrent_connect")
            }
            Self::TooSoon { client_id } => {
                format!("429::{client_id}::connect_too_soon")
            }
            Self::Config(e) => format!("500::{}::internal_error", e.message),
            Self::ServerShutdown => "500::server::shutdown".to_string(),
        }
    }

    /// Whether the failing client should be advised to re-handshake.
    pub(crate) fn wants_rehandshake(&self) -> bool {
        matches!(
            self,
            Self::UnknownClient { .. } | Self::ClientExpired { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedMessage { channel, field } => {
                write!(
                    f,
                    "Malformed message on {channel}: missing or invalid '{field}'"
                )
            }
            Self::UnknownClient { client_id } => write!(f, "Unknown clientId '{client_id}'"),
            Self::ClientExpired { client_id } => write!(f, "Expired clientId '{client_id}'"),
            Self::ConcurrentConnect { client_id } => {
                write!(f, "Concurrent connect for clientId '{client_id}'")
            }
            Self::TooSoon { client_id } => {
                write!(f, "Connect before advised interval for clientId '{client_id}'")
            }
            Self::UnknownChannel { channel } => write!(f, "Unknown channel '{channel}'"),
            Self::Config(e) => write!(f, "Configuration error: {}", e.message),
            Self::ServerShutdown => write!(f, "Mock server has shut down"),
        }
    }
}

impl std::error::Error for Error {}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
