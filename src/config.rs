//! # Server Configuration
//!
//! Configuration for the mock server's timing and lifecycle behavior.
//!
//! ## Quick Start
//!
//! The defaults match a stock CometD deployment (45 second long-poll
//! timeout, zero reconnect interval, validation on):
//!
//! ```
//! use cometd_mock::config::ServerConfig;
//!
//! let config = ServerConfig::default();
//! ```
//!
//! ## Builder Pattern
//!
//! Policies are configured through the builder, which rejects conflicting
//! axes at build time:
//!
//! ```
//! use cometd_mock::config::ServerConfig;
//!
//! let config = ServerConfig::builder()
//!     .connect_timeout(5_000)
//!     .expire_after(3)        // count-based expiry
//!     .build()
//!     .unwrap();
//!
//! // Count-based and time-based forms of the same policy conflict:
//! assert!(ServerConfig::builder()
//!     .expire_after(3)
//!     .expire_after_secs(60)
//!     .build()
//!     .is_err());
//! ```
//!
//! ## Configuration Options Reference
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `connect_interval` | 0 | `advice.interval` in ms: wait before the next connect |
//! | `connect_timeout` | 45000 | `advice.timeout` in ms: how long a connect is held |
//! | `expire_after` / `expire_after_secs` | off | Expire clientIds after N connects XOR N seconds |
//! | `reconnect_after` / `reconnect_after_secs` | off | Force `reconnect: retry` after N connects XOR N seconds |
//! | `validation` | on | Required-field validation of incoming messages |

use std::time::Duration;

use crate::error::{ConfigError, Error, Result};

/// Default `advice.interval` in milliseconds.
pub const DEFAULT_CONNECT_INTERVAL_MS: u64 = 0;

/// Default `advice.timeout` in milliseconds (45 seconds).
///
/// This is the stock CometD long-poll hold duration and the hard upper
/// bound on any single connect hold's lifetime.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 45_000;

// ============================================================================
// LIFECYCLE POLICIES
// ============================================================================

/// ClientId expiration policy.
///
/// At most one axis is active: either a connect-count threshold or a
/// time-since-handshake threshold. Checked on every registry `touch` and,
/// for the time axis, by the server's periodic sweep (so a hold can be
/// released mid-flight when its session expires).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirePolicy {
    /// Expire after this many completed connects. A threshold of N admits
    /// exactly N connects; the (N+1)th fails with `ClientExpired`.
    AfterConnects(u32),
    /// Expire once this much time has passed since the handshake.
    AfterElapsed(Duration),
}

/// Forced-reconnect policy.
///
/// When the threshold is exceeded, the next `/meta/connect` is answered
/// immediately with `successful: true` and bare `{reconnect: retry}`
/// advice instead of being held, and the session's connect counter resets.
/// Lets client retry paths be exercised without waiting out a full hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Force a retry once this many connects have completed.
    AfterConnects(u32),
    /// Force a retry once this much time has passed since the last forced
    /// retry (or the handshake).
    AfterElapsed(Duration),
}

// ============================================================================
// SERVER CONFIG
// ============================================================================

/// Mock server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `advice.interval` in ms (default: 0).
    ///
    /// Advisory only: communicated to the client, not enforced server-side.
    pub connect_interval: u64,
    /// `advice.timeout` in ms (default: 45000). Upper bound on how long a
    /// `/meta/connect` is held open.
    pub connect_timeout: u64,
    /// ClientId expiration policy (default: none, sessions never expire).
    pub expire_policy: Option<ExpirePolicy>,
    /// Forced-reconnect policy (default: none).
    pub reconnect_policy: Option<ReconnectPolicy>,
    /// Whether incoming messages are validated (default: true).
    pub validation: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            connect_interval: DEFAULT_CONNECT_INTERVAL_MS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_MS,
            expire_policy: None,
            reconnect_policy: None,
            validation: true,
        }
    }
}

impl ServerConfig {
    /// Create a builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// The connect hold duration as a [`Duration`].
    pub(crate) fn hold_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }
}

/// Builder for [`ServerConfig`].
///
/// Unlike the struct itself, the builder can express both forms of a
/// policy axis; [`build`](ServerConfigBuilder::build) rejects that.
#[derive(Debug, Default)]
#[must_use]
pub struct ServerConfigBuilder {
    connect_interval: Option<u64>,
    connect_timeout: Option<u64>,
    expire_after: Option<u32>,
    expire_after_secs: Option<u64>,
    reconnect_after: Option<u32>,
    reconnect_after_secs: Option<u64>,
    no_validation: bool,
}

impl ServerConfigBuilder {
    /// Set `advice.interval` in milliseconds.
    ///
    /// Default: 0
    pub fn connect_interval(mut self, millis: u64) -> Self {
        self.connect_interval = Some(millis);
        self
    }

    /// Set the long-poll hold duration (`advice.timeout`) in milliseconds.
    ///
    /// Default: 45000 ms
    pub fn connect_timeout(mut self, millis: u64) -> Self {
        self.connect_timeout = Some(millis);
        self
    }

    /// Expire clientIds after this many completed connects.
    ///
    /// Mutually exclusive with [`expire_after_secs`](Self::expire_after_secs).
    pub fn expire_after(mut self, connects: u32) -> Self {
        self.expire_after = Some(connects);
        self
    }

    /// Expire clientIds this many seconds after their handshake.
    ///
    /// Mutually exclusive with [`expire_after`](Self::expire_after).
    pub fn expire_after_secs(mut self, secs: u64) -> Self {
        self.expire_after_secs = Some(secs);
        self
    }

    /// Force a `reconnect: retry` response after this many connects.
    ///
    /// Mutually exclusive with
    /// [`reconnect_after_secs`](Self::reconnect_after_secs).
    pub fn reconnect_after(mut self, connects: u32) -> Self {
        self.reconnect_after = Some(connects);
        self
    }

    /// Force a `reconnect: retry` response after this many seconds.
    ///
    /// Mutually exclusive with [`reconnect_after`](Self::reconnect_after).
    pub fn reconnect_after_secs(mut self, secs: u64) -> Self {
        self.reconnect_after_secs = Some(secs);
        self
    }

    /// Disable required-field validation of incoming messages.
    ///
    /// Malformed messages then reach the session registry and fail there
    /// (an absent clientId reads as an unknown one).
    pub fn no_validation(mut self) -> Self {
        self.no_validation = true;
        self
    }

    /// Build the configuration.
    ///
    /// Fails with [`Error::Config`] when both the count-based and
    /// time-based form of the same policy are set.
    pub fn build(self) -> Result<ServerConfig> {
        let expire_policy = match (self.expire_after, self.expire_after_secs) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(ConfigError::new(
                    "expire_after and expire_after_secs are mutually exclusive",
                )))
            }
            (Some(connects), None) => Some(ExpirePolicy::AfterConnects(connects)),
            (None, Some(secs)) => Some(ExpirePolicy::AfterElapsed(Duration::from_secs(secs))),
            (None, None) => None,
        };

        let reconnect_policy = match (self.reconnect_after, self.reconnect_after_secs) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(ConfigError::new(
                    "reconnect_after and reconnect_after_secs are mutually exclusive",
                )))
            }
            (Some(connects), None) => Some(ReconnectPolicy::AfterConnects(connects)),
            (None, Some(secs)) => Some(ReconnectPolicy::AfterElapsed(Duration::from_secs(secs))),
            (None, None) => None,
        };

        Ok(ServerConfig {
            connect_interval: self.connect_interval.unwrap_or(DEFAULT_CONNECT_INTERVAL_MS),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
            expire_policy,
            reconnect_policy,
            validation: !self.no_validation,
        })
    }
}
