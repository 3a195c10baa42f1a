//! Live order WebSocket endpoint
//!
//! GET /api/ws
//!
//! Protocol:
//! - Client → Server: `{"type":"subscribe","venueId":N}` (again to switch venue)
//! - Server → Client: `subscribed` ack, `order_created` / `order_status_changed`
//!   events for the subscribed venue, `error` on a refused subscription
//!
//! A session follows exactly one venue at a time. Events dropped while
//! lagging are not replayed; clients re-fetch and poll.

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use shared::error::AppError;
use shared::live::{ClientCommand, LiveEvent, ServerMessage};
use tokio::sync::broadcast;
use tokio::time::Duration;

use crate::live::VenueReceiver;
use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub fn router() -> Router<AppState> {
    Router::new().route("/api/ws", get(handle_ws))
}

async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_session(socket, state))
}

async fn ws_session(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let mut subscription: Option<VenueReceiver> = None;

    tracing::debug!("Live WS connected");

    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            event = next_event(&mut subscription) => {
                match event {
                    Ok(event) => {
                        if send_message(&mut sink, &ServerMessage::from(event)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if let Some(rx) = subscription.as_mut() {
                            tracing::warn!(venue_id = rx.venue_id(), lagged = n, "Live subscriber lagged, skipping ahead");
                            rx.resubscribe();
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        subscription = None;
                    }
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(ClientCommand::Subscribe { venue_id }) =
                            serde_json::from_str::<ClientCommand>(&text)
                        else {
                            tracing::debug!("Ignoring unknown live frame");
                            continue;
                        };

                        // Leave the previous venue before joining the next one
                        subscription = None;
                        let reply = match subscribe(&state, venue_id).await {
                            Ok(rx) => {
                                tracing::info!(venue_id, subscribers = state.hub.subscriber_count(venue_id), "Live WS subscribed");
                                subscription = Some(rx);
                                ServerMessage::subscribed(venue_id)
                            }
                            Err(e) => {
                                tracing::info!(venue_id, error = %e, "Live WS subscription refused");
                                ServerMessage::error(e.message)
                            }
                        };
                        if send_message(&mut sink, &reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    tracing::debug!(
        venue_id = subscription.as_ref().map(|s| s.venue_id()),
        "Live WS disconnected"
    );
}

async fn subscribe(state: &AppState, venue_id: i64) -> Result<VenueReceiver, AppError> {
    state.orders.find_venue(venue_id).await?;
    state.hub.subscribe(venue_id)
}

/// Next event of the current venue; pending while unsubscribed
async fn next_event(
    subscription: &mut Option<VenueReceiver>,
) -> Result<LiveEvent, broadcast::error::RecvError> {
    match subscription {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_message<S>(sink: &mut S, msg: &ServerMessage) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
