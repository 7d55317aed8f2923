//! # Advice Generation
//!
//! Builders for the `advice` object returned on handshake and connect
//! responses. Pure functions of the configuration: no hidden state,
//! deterministic for given inputs.
//!
//! | Builder | `reconnect` | When |
//! |---------|-------------|------|
//! | [`baseline`] | `retry` | Every handshake and successful connect |
//! | [`rehandshake`] | `handshake` | Session unknown or just expired |
//! | [`forced_retry`] | `retry` (bare) | Forced-reconnect policy triggered |
//! | [`none`] | `none` | Validation failures, disconnect paths |

use crate::config::ServerConfig;
use crate::message::{Advice, Reconnect};

/// Baseline advice: keep long-polling with the configured timings.
pub fn baseline(config: &ServerConfig) -> Advice {
    Advice {
        reconnect: Reconnect::Retry,
        interval: Some(config.connect_interval),
        timeout: Some(config.connect_timeout),
    }
}

/// The session is gone: re-handshake instead of retrying the connect.
///
/// `timeout: 0` tells the client not to expect the next request to be held.
pub fn rehandshake(config: &ServerConfig) -> Advice {
    Advice {
        reconnect: Reconnect::Handshake,
        interval: Some(config.connect_interval),
        timeout: Some(0),
    }
}

/// Bare retry advice for a policy-forced reconnect.
///
/// Carries no timings, mirroring what servers send when they merely want
/// the client to come back.
pub fn forced_retry() -> Advice {
    Advice {
        reconnect: Reconnect::Retry,
        interval: None,
        timeout: None,
    }
}

/// Stop reconnecting.
pub fn none() -> Advice {
    Advice {
        reconnect: Reconnect::None,
        interval: None,
        timeout: None,
    }
}
