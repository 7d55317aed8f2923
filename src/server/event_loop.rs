//! # Server Event Loop
//!
//! Internal event loop that processes commands and drives connect holds.
//!
//! This module contains the `server_task` function which is the core of
//! the mock server. It runs as a background tokio task and handles:
//!
//! - Commands from handles (one per meta channel, plus delivery and
//!   inspection)
//! - Connect hold completion (timeout or early release)
//! - Periodic time-based session expiry
//!
//! The task owns all state exclusively; a hold never blocks the loop. A
//! registered hold is a `timeout(connect_timeout, release_rx)` future in a
//! `FuturesUnordered`, so the configured timeout is a hard upper bound on
//! any hold's lifetime and every hold is eventually released — by deadline,
//! by delivery, by expiry, by disconnect, or by shutdown.

use std::pin::Pin;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;

use super::handlers;
use super::handlers::ConnectDisposition;
use super::state::{HeldConnect, HoldOutcome, ServerState};
use crate::command::{Command, HoldRelease};
use crate::message::Message;

/// Granularity of the time-based expiry sweep.
const SWEEP_INTERVAL: Duration = Duration::from_millis(250);

type HoldFuture = Pin<Box<dyn std::future::Future<Output = HeldConnect> + Send>>;

/// The main server task.
pub(crate) async fn server_task(mut state: ServerState, mut cmd_rx: mpsc::Receiver<Command>) {
    let mut holds: FuturesUnordered<HoldFuture> = FuturesUnordered::new();
    let mut sweep = interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Shutdown) | None => {
                        shutdown(&mut state, &mut holds).await;
                        break;
                    }
                    Some(Command::Connect { message, respond }) => {
                        handle_connect(&mut state, &mut holds, message, respond);
                    }
                    Some(Command::Handshake { message, respond }) => {
                        let _ = respond.send(handlers::handshake(&mut state, message));
                    }
                    Some(Command::Disconnect { message, respond }) => {
                        let _ = respond.send(handlers::disconnect(&mut state, message));
                    }
                    Some(Command::Subscribe { message, respond }) => {
                        let _ = respond.send(handlers::subscribe(&mut state, message));
                    }
                    Some(Command::Unsubscribe { message, respond }) => {
                        let _ = respond.send(handlers::unsubscribe(&mut state, message));
                    }
                    Some(Command::Deliver { client_id, event, respond }) => {
                        let _ = respond.send(handlers::deliver(&mut state, &client_id, event));
                    }
                    Some(Command::SessionCount { respond }) => {
                        let _ = respond.send(state.registry.len());
                    }
                    Some(Command::Inspect { client_id, respond }) => {
                        let _ = respond.send(handlers::inspect(&state, &client_id));
                    }
                }
            }

            // A hold resolved: by timeout, delivery, expiry, or disconnect.
            Some(held) = holds.next() => {
                let HeldConnect { client_id, message_id, respond, outcome } = held;
                let response =
                    handlers::complete_connect(&mut state, &client_id, message_id, outcome);
                let _ = respond.send(response);
            }

            // Time-based expiry: releases holds of sessions that expired
            // mid-flight instead of waiting for their next touch.
            _ = sweep.tick() => {
                handlers::sweep_expired(&mut state);
            }
        }
    }
}

/// Dispatch a connect: either an immediate response or a new hold future.
fn handle_connect(
    state: &mut ServerState,
    holds: &mut FuturesUnordered<HoldFuture>,
    message: Message,
    respond: oneshot::Sender<Vec<Message>>,
) {
    match handlers::connect(state, message) {
        ConnectDisposition::Respond(response) => {
            let _ = respond.send(response);
        }
        ConnectDisposition::Hold {
            client_id,
            message_id,
            release_rx,
        } => {
            let hold_timeout = state.config.hold_timeout();
            holds.push(Box::pin(async move {
                let outcome = match tokio::time::timeout(hold_timeout, release_rx).await {
                    Ok(Ok(release)) => HoldOutcome::Released(release),
                    // Release handle dropped without firing: only happens
                    // on state teardown; treat as the idle return.
                    Ok(Err(_)) => HoldOutcome::Timeout,
                    Err(_) => HoldOutcome::Timeout,
                };
                HeldConnect {
                    client_id,
                    message_id,
                    respond,
                    outcome,
                }
            }));
        }
    }
}

/// Drain outstanding holds so no long-poll is left dangling, then exit.
async fn shutdown(state: &mut ServerState, holds: &mut FuturesUnordered<HoldFuture>) {
    tracing::info!(
        "mock server shutting down, draining {} held connect(s)",
        holds.len()
    );

    for session in state.registry.sessions_mut() {
        if let Some(hold) = session.pending_connect.take() {
            let _ = hold.release.send(HoldRelease::Shutdown);
        }
    }

    while let Some(held) = holds.next().await {
        let HeldConnect {
            client_id,
            message_id,
            respond,
            outcome,
        } = held;
        let response = handlers::complete_connect(state, &client_id, message_id, outcome);
        let _ = respond.send(response);
    }

    tracing::info!("mock server shutdown complete");
}
