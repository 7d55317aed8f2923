//! # Session Registry
//!
//! The registry owns the set of active client sessions: it issues
//! clientIds, tracks per-session connect counters and subscriptions, and
//! applies the configured expiration policy.
//!
//! ## Design Philosophy
//!
//! The registry is a plain data structure with no interior locking. The
//! server's event loop owns it exclusively; handlers take `&mut` access
//! and every operation completes in bounded time without blocking on any
//! session's outstanding connect hold.
//!
//! ## Key Data Structures
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`SessionRegistry`] | Top-level session container |
//! | [`Session`] | Per-client state (counters, subscriptions, hold) |
//! | [`SessionState`] | `Handshaken → Connected ⇄ Connected → Expired \| Disconnected` |
//! | [`SessionSnapshot`] | Read-only copy for inspection APIs |
//!
//! ## Expiration
//!
//! At most one policy axis is active (count-based or time-based). `touch`
//! applies the policy before returning: a triggered policy removes the
//! session and the call fails with `ClientExpired` instead of returning
//! it. Expired ids are remembered in a bounded FIFO of tombstones so later
//! lookups can distinguish `ClientExpired` from `UnknownClient`.

use std::collections::{HashMap, HashSet, VecDeque};

use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

use crate::command::HoldRelease;
use crate::config::ExpirePolicy;
use crate::error::{Error, Result};
use crate::message::Message;

/// How many expired clientIds the registry remembers for
/// `ClientExpired`-vs-`UnknownClient` discrimination.
const TOMBSTONE_LIMIT: usize = 1024;

// ============================================================================
// SESSION
// ============================================================================

/// Lifecycle state of a session.
///
/// `Expired` and `Disconnected` are terminal; a session in either state is
/// no longer in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created by handshake, no connect completed yet.
    Handshaken,
    /// At least one connect completed.
    Connected,
    /// Invalidated by the expiration policy.
    Expired,
    /// Removed by an explicit disconnect.
    Disconnected,
}

/// An outstanding connect hold's release handle.
///
/// Invariant: a session has at most one of these at a time. Sending on
/// `release` wakes the hold future; dropping it lets the hold run to its
/// timeout.
#[derive(Debug)]
pub(crate) struct ConnectHold {
    pub(crate) release: oneshot::Sender<HoldRelease>,
}

/// One client session, created by a successful handshake.
#[derive(Debug)]
pub struct Session {
    client_id: String,
    pub(crate) state: SessionState,
    pub(crate) connection_count: u32,
    pub(crate) created_at: Instant,
    pub(crate) last_seen_at: Instant,
    /// Baseline for the time-based forced-reconnect policy; reset on each
    /// forced retry.
    pub(crate) reconnect_epoch: Instant,
    pub(crate) subscriptions: HashSet<String>,
    pub(crate) pending_connect: Option<ConnectHold>,
    /// Events delivered while no connect was held; drained by the next
    /// connect.
    pub(crate) queued_events: VecDeque<Message>,
}

impl Session {
    fn new(client_id: String) -> Self {
        let now = Instant::now();
        Self {
            client_id,
            state: SessionState::Handshaken,
            connection_count: 0,
            created_at: now,
            last_seen_at: now,
            reconnect_epoch: now,
            subscriptions: HashSet::new(),
            pending_connect: None,
            queued_events: VecDeque::new(),
        }
    }

    /// The session's clientId.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Completed connects for this session.
    pub fn connection_count(&self) -> u32 {
        self.connection_count
    }

    /// When the handshake created this session.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When a connect last completed for this session.
    pub fn last_seen_at(&self) -> Instant {
        self.last_seen_at
    }

    /// Channels this client is subscribed to.
    pub fn subscriptions(&self) -> &HashSet<String> {
        &self.subscriptions
    }

    /// Whether a connect hold is currently outstanding.
    pub fn is_holding(&self) -> bool {
        self.pending_connect.is_some()
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        let mut subscriptions: Vec<String> = self.subscriptions.iter().cloned().collect();
        subscriptions.sort();
        SessionSnapshot {
            client_id: self.client_id.clone(),
            state: self.state,
            connection_count: self.connection_count,
            subscriptions,
            holding: self.is_holding(),
        }
    }
}

/// Read-only copy of a session's observable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub client_id: String,
    pub state: SessionState,
    pub connection_count: u32,
    /// Sorted for deterministic assertions.
    pub subscriptions: Vec<String>,
    pub holding: bool,
}

// ============================================================================
// REGISTRY
// ============================================================================

/// The set of active client sessions.
pub struct SessionRegistry {
    sessions: HashMap<String, Session>,
    /// FIFO of recently expired clientIds, capped at [`TOMBSTONE_LIMIT`].
    expired: VecDeque<String>,
    expire_policy: Option<ExpirePolicy>,
}

impl SessionRegistry {
    /// Create an empty registry with the given expiration policy.
    pub fn new(expire_policy: Option<ExpirePolicy>) -> Self {
        Self {
            sessions: HashMap::new(),
            expired: VecDeque::new(),
            expire_policy,
        }
    }

    /// Create a fresh session in state `Handshaken` and return its
    /// clientId. Ids are UUID v4 — collision-free for any realistic test
    /// run. Never blocks.
    pub fn create_session(&mut self) -> String {
        let client_id = Uuid::new_v4().to_string();
        self.sessions
            .insert(client_id.clone(), Session::new(client_id.clone()));
        tracing::debug!("created session {client_id}");
        client_id
    }

    /// Look up a session by clientId.
    ///
    /// Fails with `ClientExpired` for recently expired ids and
    /// `UnknownClient` otherwise — never silently treats an unknown id as
    /// a fresh session.
    pub fn lookup(&self, client_id: &str) -> Result<&Session> {
        match self.sessions.get(client_id) {
            Some(session) => Ok(session),
            None => Err(self.absence_error(client_id)),
        }
    }

    pub(crate) fn lookup_mut(&mut self, client_id: &str) -> Result<&mut Session> {
        if self.sessions.contains_key(client_id) {
            match self.sessions.get_mut(client_id) {
                Some(session) => Ok(session),
                None => Err(Error::UnknownClient {
                    client_id: client_id.to_string(),
                }),
            }
        } else {
            Err(self.absence_error(client_id))
        }
    }

    /// Record a completed connect: applies the expiration policy, then
    /// updates `last_seen_at` and increments `connection_count`.
    ///
    /// If the policy triggers, the session is removed (tombstoned) and the
    /// call fails with `ClientExpired` instead of returning the session. A
    /// count threshold of N therefore admits exactly N completed connects.
    pub fn touch(&mut self, client_id: &str) -> Result<&mut Session> {
        let hit = match self.sessions.get(client_id) {
            None => return Err(self.absence_error(client_id)),
            Some(session) => match self.expire_policy {
                Some(ExpirePolicy::AfterConnects(threshold)) => {
                    session.connection_count >= threshold
                }
                Some(ExpirePolicy::AfterElapsed(window)) => {
                    session.created_at.elapsed() >= window
                }
                None => false,
            },
        };

        if hit {
            self.expire(client_id);
            return Err(Error::ClientExpired {
                client_id: client_id.to_string(),
            });
        }

        match self.sessions.get_mut(client_id) {
            Some(session) => {
                session.connection_count += 1;
                session.last_seen_at = Instant::now();
                session.state = SessionState::Connected;
                Ok(session)
            }
            None => Err(Error::UnknownClient {
                client_id: client_id.to_string(),
            }),
        }
    }

    /// Add `channel` to the session's subscription set.
    pub fn subscribe(&mut self, client_id: &str, channel: &str) -> Result<()> {
        let session = self.lookup_mut(client_id)?;
        session.subscriptions.insert(channel.to_string());
        Ok(())
    }

    /// Remove `channel` from the session's subscription set.
    ///
    /// Idempotent: succeeds even when the channel was never subscribed.
    pub fn unsubscribe(&mut self, client_id: &str, channel: &str) -> Result<()> {
        let session = self.lookup_mut(client_id)?;
        session.subscriptions.remove(channel);
        Ok(())
    }

    /// Remove a session (disconnect path). Idempotent; returns the removed
    /// session so the caller can release an outstanding hold.
    pub fn remove(&mut self, client_id: &str) -> Option<Session> {
        let mut session = self.sessions.remove(client_id)?;
        session.state = SessionState::Disconnected;
        tracing::debug!("removed session {client_id}");
        Some(session)
    }

    /// Remove a session by expiration: like [`remove`](Self::remove), but
    /// leaves a tombstone so later lookups answer `ClientExpired`.
    pub(crate) fn expire(&mut self, client_id: &str) -> Option<Session> {
        let mut session = self.sessions.remove(client_id)?;
        session.state = SessionState::Expired;
        if self.expired.len() == TOMBSTONE_LIMIT {
            self.expired.pop_front();
        }
        self.expired.push_back(client_id.to_string());
        tracing::debug!("expired session {client_id}");
        Some(session)
    }

    /// Sessions whose time-based expiration window has elapsed.
    ///
    /// Used by the event loop's sweep so that a hold is released promptly
    /// when its session expires mid-flight, not only at the next touch.
    pub(crate) fn time_expired_ids(&self, now: Instant) -> Vec<String> {
        let Some(ExpirePolicy::AfterElapsed(window)) = self.expire_policy else {
            return Vec::new();
        };
        self.sessions
            .values()
            .filter(|session| now.duration_since(session.created_at) >= window)
            .map(|session| session.client_id.clone())
            .collect()
    }

    /// The error a missing clientId maps to: `ClientExpired` for
    /// tombstoned ids, `UnknownClient` otherwise.
    pub fn absence_error(&self, client_id: &str) -> Error {
        if self.expired.iter().any(|id| id == client_id) {
            Error::ClientExpired {
                client_id: client_id.to_string(),
            }
        } else {
            Error::UnknownClient {
                client_id: client_id.to_string(),
            }
        }
    }

    pub(crate) fn sessions_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry has no live sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn every_handshake_gets_a_distinct_client_id() {
        let mut registry = SessionRegistry::new(None);
        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(registry.create_session()));
        }
        assert_eq!(registry.len(), 100);
    }

    #[test]
    fn lookup_of_unknown_id_is_an_explicit_error() {
        let registry = SessionRegistry::new(None);
        assert_eq!(
            registry.lookup("nope").unwrap_err(),
            Error::UnknownClient {
                client_id: "nope".into()
            }
        );
    }

    #[tokio::test]
    async fn touch_increments_and_transitions_to_connected() {
        let mut registry = SessionRegistry::new(None);
        let id = registry.create_session();
        assert_eq!(registry.lookup(&id).unwrap().state(), SessionState::Handshaken);

        registry.touch(&id).unwrap();
        registry.touch(&id).unwrap();

        let session = registry.lookup(&id).unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(session.connection_count(), 2);
    }

    #[tokio::test]
    async fn count_threshold_admits_exactly_n_connects() {
        let mut registry = SessionRegistry::new(Some(ExpirePolicy::AfterConnects(3)));
        let id = registry.create_session();

        for _ in 0..3 {
            registry.touch(&id).unwrap();
        }
        assert_eq!(
            registry.touch(&id).unwrap_err(),
            Error::ClientExpired {
                client_id: id.clone()
            }
        );

        // Removed and tombstoned: lookups now report the expiry, not an
        // unknown client.
        assert_eq!(
            registry.lookup(&id).unwrap_err(),
            Error::ClientExpired {
                client_id: id.clone()
            }
        );
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn time_threshold_expires_on_touch() {
        let mut registry =
            SessionRegistry::new(Some(ExpirePolicy::AfterElapsed(Duration::from_secs(10))));
        let id = registry.create_session();

        tokio::time::advance(Duration::from_secs(5)).await;
        registry.touch(&id).unwrap();

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(matches!(
            registry.touch(&id).unwrap_err(),
            Error::ClientExpired { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn time_expired_ids_only_reports_elapsed_sessions() {
        let mut registry =
            SessionRegistry::new(Some(ExpirePolicy::AfterElapsed(Duration::from_secs(10))));
        let old = registry.create_session();
        tokio::time::advance(Duration::from_secs(11)).await;
        let young = registry.create_session();

        let expired = registry.time_expired_ids(Instant::now());
        assert_eq!(expired, vec![old]);
        assert!(!expired.contains(&young));
    }

    #[test]
    fn no_policy_means_no_expiry() {
        let mut registry = SessionRegistry::new(None);
        let id = registry.create_session();
        for _ in 0..1000 {
            registry.touch(&id).unwrap();
        }
        assert_eq!(registry.lookup(&id).unwrap().connection_count(), 1000);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let mut registry = SessionRegistry::new(None);
        let id = registry.create_session();

        registry.subscribe(&id, "/foo").unwrap();
        assert!(registry.lookup(&id).unwrap().subscriptions().contains("/foo"));

        // Never subscribed: still succeeds.
        registry.unsubscribe(&id, "/bar").unwrap();
        registry.unsubscribe(&id, "/foo").unwrap();
        registry.unsubscribe(&id, "/foo").unwrap();
        assert!(registry.lookup(&id).unwrap().subscriptions().is_empty());
    }

    #[test]
    fn remove_is_idempotent_and_leaves_no_tombstone() {
        let mut registry = SessionRegistry::new(None);
        let id = registry.create_session();

        let removed = registry.remove(&id).expect("first removal");
        assert_eq!(removed.state(), SessionState::Disconnected);
        assert!(registry.remove(&id).is_none());

        // Disconnected, not expired: subsequent lookups see an unknown id.
        assert_eq!(
            registry.lookup(&id).unwrap_err(),
            Error::UnknownClient { client_id: id }
        );
    }

    #[test]
    fn tombstones_are_bounded() {
        let mut registry = SessionRegistry::new(Some(ExpirePolicy::AfterConnects(0)));
        let first = registry.create_session();
        registry.expire(&first);

        for _ in 0..TOMBSTONE_LIMIT {
            let id = registry.create_session();
            registry.expire(&id);
        }

        // The oldest tombstone was evicted; the id reads as unknown again.
        assert_eq!(
            registry.lookup(&first).unwrap_err(),
            Error::UnknownClient { client_id: first }
        );
    }
}
