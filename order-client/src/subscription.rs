//! Reconnecting per-venue live subscription
//!
//! A single background task owns the socket and the reconnect timer:
//!
//! ```text
//! Disconnected ──venue set──▶ Connecting ──ack──▶ Subscribed
//!      ▲                          │                   │
//!      └──── retry_interval ◀─────┴── drop / refusal ─┘
//! ```
//!
//! Changing venue re-sends the `subscribe` frame on the open socket. Events
//! for any other venue are discarded.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use shared::{ClientCommand, ControlMessage, LiveEvent, ServerMessage};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::{ClientConfig, ClientResult};

/// WebSocket keepalive ping interval
const WS_PING_INTERVAL_SECS: u64 = 30;

/// Events buffered for a slow consumer before the socket reader waits
const EVENT_BUFFER: usize = 64;

/// Connection state of a [`VenueSubscription`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
}

/// Handle to the live subscription task
///
/// Dropping the handle stops the task.
pub struct VenueSubscription {
    venue: watch::Sender<Option<i64>>,
    state: watch::Receiver<ConnectionState>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl VenueSubscription {
    /// Start the subscription task and return the event stream.
    ///
    /// Nothing connects until [`set_venue`](Self::set_venue) is called. The
    /// stream ends when the task stops (shutdown or `max_attempts` reached).
    pub fn spawn(config: &ClientConfig) -> (Self, mpsc::Receiver<LiveEvent>) {
        let (venue_tx, venue_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let shutdown = CancellationToken::new();

        let worker = SubscriptionWorker {
            ws_url: config.ws_url.clone(),
            retry_interval: config.retry_interval,
            max_attempts: config.max_attempts,
            venue: venue_rx,
            state: state_tx,
            events: events_tx,
            shutdown: shutdown.clone(),
        };
        let task = tokio::spawn(worker.run());

        let handle = Self {
            venue: venue_tx,
            state: state_rx,
            shutdown,
            task: Some(task),
        };
        (handle, events_rx)
    }

    /// Subscribe to `venue_id`, replacing the current venue
    pub fn set_venue(&self, venue_id: i64) {
        self.venue.send_if_modified(|current| {
            if *current == Some(venue_id) {
                return false;
            }
            *current = Some(venue_id);
            true
        });
    }

    pub fn venue_id(&self) -> Option<i64> {
        *self.venue.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver notified on every state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// `false` once the task gave up or was shut down
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Close the socket and wait for the task to finish
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!("Venue subscription task ended abnormally: {e}");
        }
    }
}

impl Drop for VenueSubscription {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// How a socket session ended
enum SessionEnd {
    /// Shutdown requested or the event receiver went away
    Shutdown,
    /// Connection failed, dropped or was refused
    Lost { subscribed: bool },
}

struct SubscriptionWorker {
    ws_url: String,
    retry_interval: Duration,
    max_attempts: Option<u32>,
    venue: watch::Receiver<Option<i64>>,
    state: watch::Sender<ConnectionState>,
    events: mpsc::Sender<LiveEvent>,
    shutdown: CancellationToken,
}

impl SubscriptionWorker {
    async fn run(mut self) {
        tracing::debug!(url = %self.ws_url, "Venue subscription started");
        // Consecutive attempts that never reached Subscribed
        let mut failures: u32 = 0;

        loop {
            let current = *self.venue.borrow_and_update();
            let Some(venue_id) = current else {
                if self.wait_for_venue().await {
                    continue;
                }
                break;
            };

            self.set_state(ConnectionState::Connecting);
            match self.session(venue_id).await {
                SessionEnd::Shutdown => break,
                SessionEnd::Lost { subscribed } => {
                    self.set_state(ConnectionState::Disconnected);
                    failures = if subscribed { 0 } else { failures + 1 };
                    if let Some(max) = self.max_attempts
                        && failures >= max
                    {
                        tracing::warn!(venue_id, failures, "Giving up on venue subscription");
                        break;
                    }
                }
            }

            tracing::debug!(
                venue_id,
                delay_ms = self.retry_interval.as_millis() as u64,
                "Reconnecting venue subscription"
            );
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.retry_interval) => {}
                changed = self.venue.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    failures = 0;
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        tracing::debug!("Venue subscription stopped");
    }

    /// Idle until a venue is set. `false` on shutdown.
    async fn wait_for_venue(&mut self) -> bool {
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            changed = self.venue.changed() => changed.is_ok(),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    /// Run one socket until it drops, is refused, or shutdown
    async fn session(&mut self, mut venue_id: i64) -> SessionEnd {
        let connected = tokio::select! {
            _ = self.shutdown.cancelled() => return SessionEnd::Shutdown,
            result = connect_async(self.ws_url.as_str()) => result,
        };
        let ws = match connected {
            Ok((ws, _)) => ws,
            Err(e) => {
                tracing::warn!(venue_id, "Live connection failed: {e}");
                return SessionEnd::Lost { subscribed: false };
            }
        };
        let (mut sink, mut stream) = ws.split();

        if let Err(e) = send_subscribe(&mut sink, venue_id).await {
            tracing::warn!(venue_id, "Failed to send subscribe: {e}");
            return SessionEnd::Lost { subscribed: false };
        }

        let mut subscribed = false;
        let mut ever_subscribed = false;
        let mut ping_interval = tokio::time::interval(Duration::from_secs(WS_PING_INTERVAL_SECS));
        ping_interval.tick().await; // skip immediate tick

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                }

                // Venue switch → resubscribe on the same socket
                changed = self.venue.changed() => {
                    if changed.is_err() {
                        let _ = sink.close().await;
                        return SessionEnd::Shutdown;
                    }
                    let next = *self.venue.borrow_and_update();
                    if let Some(next) = next
                        && next != venue_id
                    {
                        venue_id = next;
                        subscribed = false;
                        self.set_state(ConnectionState::Connecting);
                        if let Err(e) = send_subscribe(&mut sink, venue_id).await {
                            tracing::warn!(venue_id, "Failed to send subscribe: {e}");
                            return SessionEnd::Lost { subscribed: ever_subscribed };
                        }
                    }
                }

                // Keepalive ping
                _ = ping_interval.tick() => {
                    if sink.send(Message::Ping(vec![].into())).await.is_err() {
                        tracing::warn!(venue_id, "WS ping failed, disconnecting");
                        return SessionEnd::Lost { subscribed: ever_subscribed };
                    }
                }

                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerMessage>(&text) {
                                Ok(ServerMessage::Control(ControlMessage::Subscribed { venue_id: acked }))
                                    if acked == venue_id =>
                                {
                                    subscribed = true;
                                    ever_subscribed = true;
                                    self.set_state(ConnectionState::Subscribed);
                                    tracing::info!(venue_id, "Subscribed to venue");
                                }
                                Ok(ServerMessage::Control(ControlMessage::Subscribed { .. })) => {}
                                Ok(ServerMessage::Control(ControlMessage::Error { message })) => {
                                    tracing::warn!(venue_id, "Subscription refused: {message}");
                                    let _ = sink.close().await;
                                    return SessionEnd::Lost { subscribed: false };
                                }
                                Ok(ServerMessage::Event(event)) => {
                                    if subscribed
                                        && event.venue_id == venue_id
                                        && self.events.send(event).await.is_err()
                                    {
                                        let _ = sink.close().await;
                                        return SessionEnd::Shutdown;
                                    }
                                }
                                Err(e) => {
                                    tracing::debug!("Ignoring unrecognised live frame: {e}");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = sink.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!(venue_id, "WebSocket closed by server");
                            return SessionEnd::Lost { subscribed: ever_subscribed };
                        }
                        Some(Err(e)) => {
                            tracing::warn!(venue_id, "WebSocket error: {e}");
                            return SessionEnd::Lost { subscribed: ever_subscribed };
                        }
                        None => {
                            tracing::info!(venue_id, "WebSocket stream ended");
                            return SessionEnd::Lost { subscribed: ever_subscribed };
                        }
                        _ => {} // Binary, Pong
                    }
                }
            }
        }
    }
}

async fn send_subscribe<S>(sink: &mut S, venue_id: i64) -> ClientResult<()>
where
    S: futures::Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let json = serde_json::to_string(&ClientCommand::Subscribe { venue_id })?;
    sink.send(Message::Text(json.into())).await?;
    Ok(())
}
