//! # Message Validation
//!
//! Required-field validation of incoming Bayeux messages, applied at the
//! boundary before a message reaches the session registry. Stateless and
//! side-effect free; can be disabled wholesale via configuration, in which
//! case malformed messages travel on and fail at the registry instead.
//!
//! ## Per-Channel Rules
//!
//! | Channel | Required fields |
//! |---------|-----------------|
//! | `/meta/handshake` | `version`, non-empty `supportedConnectionTypes` |
//! | `/meta/connect` | `clientId`, `connectionType` |
//! | `/meta/disconnect` | `clientId` |
//! | `/meta/subscribe` | `clientId`, `subscription` |
//! | `/meta/unsubscribe` | `clientId`, `subscription` |
//!
//! Every message additionally needs a channel starting with `/`.

use crate::error::{Error, Result};
use crate::message::{Message, MetaChannel};

/// Stateless required-field validator.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    enabled: bool,
}

impl Validator {
    /// Create a validator. A disabled validator accepts everything.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Check `message` against the rules for `channel`.
    ///
    /// Returns [`Error::MalformedMessage`] naming the first offending
    /// field. Always `Ok` when disabled.
    pub fn validate(&self, channel: MetaChannel, message: &Message) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if !message.channel.starts_with('/') {
            return Err(malformed(message, "channel"));
        }

        match channel {
            MetaChannel::Handshake => {
                if none_or_empty(message.version.as_deref()) {
                    return Err(malformed(message, "version"));
                }
                let supported = message
                    .supported_connection_types
                    .as_ref()
                    .is_some_and(|types| !types.is_empty());
                if !supported {
                    return Err(malformed(message, "supportedConnectionTypes"));
                }
            }
            MetaChannel::Connect => {
                if none_or_empty(message.client_id.as_deref()) {
                    return Err(malformed(message, "clientId"));
                }
                if none_or_empty(message.connection_type.as_deref()) {
                    return Err(malformed(message, "connectionType"));
                }
            }
            MetaChannel::Disconnect => {
                if none_or_empty(message.client_id.as_deref()) {
                    return Err(malformed(message, "clientId"));
                }
            }
            MetaChannel::Subscribe | MetaChannel::Unsubscribe => {
                if none_or_empty(message.client_id.as_deref()) {
                    return Err(malformed(message, "clientId"));
                }
                if none_or_empty(message.subscription.as_deref()) {
                    return Err(malformed(message, "subscription"));
                }
            }
        }

        Ok(())
    }
}

fn none_or_empty(field: Option<&str>) -> bool {
    field.map_or(true, str::is_empty)
}

fn malformed(message: &Message, field: &'static str) -> Error {
    Error::MalformedMessage {
        channel: message.channel.clone(),
        field,
    }
}
