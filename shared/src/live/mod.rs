//! Live order broadcast protocol
//!
//! Server → Client: [`ServerMessage`] (ack, events, errors)
//! Client → Server: [`ClientCommand`] (venue subscription)
//!
//! Event payloads are thin signals. Receivers re-fetch the authoritative
//! order from the HTTP API instead of patching local state.

use serde::{Deserialize, Serialize};

use crate::order::OrderStatus;

/// Kind of a venue-scoped order event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveEventKind {
    OrderCreated,
    OrderStatusChanged,
}

/// Thin payload carried by every order event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSignal {
    pub order_id: i64,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// `{type, venueId, data}` envelope pushed to every socket of a venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveEvent {
    #[serde(rename = "type")]
    pub kind: LiveEventKind,
    pub venue_id: i64,
    pub data: OrderSignal,
}

impl LiveEvent {
    pub fn order_created(venue_id: i64, data: OrderSignal) -> Self {
        Self {
            kind: LiveEventKind::OrderCreated,
            venue_id,
            data,
        }
    }

    pub fn order_status_changed(venue_id: i64, data: OrderSignal) -> Self {
        Self {
            kind: LiveEventKind::OrderStatusChanged,
            venue_id,
            data,
        }
    }
}

/// Client → Server command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Replace the current venue subscription
    Subscribe {
        #[serde(rename = "venueId")]
        venue_id: i64,
    },
}

/// Server → Client frame
///
/// Events are serialized flat so the wire shape stays `{type, venueId, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Event(LiveEvent),
    Control(ControlMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Subscription to `venue_id` is active
    Subscribed {
        #[serde(rename = "venueId")]
        venue_id: i64,
    },
    Error { message: String },
}

impl ServerMessage {
    pub fn subscribed(venue_id: i64) -> Self {
        Self::Control(ControlMessage::Subscribed { venue_id })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Control(ControlMessage::Error {
            message: message.into(),
        })
    }
}

impl From<LiveEvent> for ServerMessage {
    fn from(event: LiveEvent) -> Self {
        Self::Event(event)
    }
}
