//! VenueHub: per-venue order event fan-out
//!
//! ```text
//! OrderService (create / status change)
//!       │ LiveEvent
//!       ▼
//! VenueHub
//!   └── venues: venue_id → broadcast::Sender<LiveEvent> + connection count
//!         │
//!         ▼
//!   WS sessions (one venue each, re-fetch on signal)
//! ```
//!
//! Channels are created on first subscribe and removed when the last
//! subscriber of a venue goes away. Publishing to a venue nobody watches is
//! a no-op.

use std::sync::Arc;

use dashmap::DashMap;
use shared::error::{AppError, ErrorCode};
use shared::live::LiveEvent;
use tokio::sync::broadcast;

/// Broadcast channel capacity per venue
const BROADCAST_CAPACITY: usize = 256;

struct VenueChannel {
    tx: broadcast::Sender<LiveEvent>,
    /// Live subscriptions, kept under the map's entry lock
    connections: usize,
}

/// Global venue hub; events never cross venues
#[derive(Clone)]
pub struct VenueHub {
    venues: Arc<DashMap<i64, VenueChannel>>,
    max_per_venue: usize,
}

impl VenueHub {
    pub fn new(max_per_venue: usize) -> Self {
        Self {
            venues: Arc::new(DashMap::new()),
            max_per_venue,
        }
    }

    /// Fan an event out to the subscribers of its venue
    ///
    /// Returns how many receivers it was queued for.
    pub fn publish(&self, event: LiveEvent) -> usize {
        let Some(channel) = self.venues.get(&event.venue_id) else {
            return 0;
        };
        // send only fails without receivers
        channel.tx.send(event).unwrap_or(0)
    }

    /// Join a venue's channel, bounded by the per-venue connection limit
    pub fn subscribe(&self, venue_id: i64) -> Result<VenueReceiver, AppError> {
        let mut channel = self.venues.entry(venue_id).or_insert_with(|| {
            let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
            VenueChannel { tx, connections: 0 }
        });
        if channel.connections >= self.max_per_venue {
            let current = channel.connections;
            drop(channel);
            return Err(AppError::with_message(
                ErrorCode::TooManyConnections,
                format!(
                    "Too many live connections for venue {venue_id} ({current}/{})",
                    self.max_per_venue
                ),
            )
            .with_detail("venue_id", venue_id));
        }
        channel.connections += 1;
        let rx = channel.tx.subscribe();
        drop(channel);

        Ok(VenueReceiver {
            venue_id,
            rx,
            hub: self.clone(),
        })
    }

    pub fn subscriber_count(&self, venue_id: i64) -> usize {
        self.venues
            .get(&venue_id)
            .map(|c| c.connections)
            .unwrap_or(0)
    }

    /// Venues with at least one subscriber
    pub fn venue_count(&self) -> usize {
        self.venues.len()
    }

    fn release(&self, venue_id: i64) {
        if let Some(mut channel) = self.venues.get_mut(&venue_id) {
            channel.connections = channel.connections.saturating_sub(1);
        }
        self.venues
            .remove_if(&venue_id, |_, channel| channel.connections == 0);
    }
}

/// A single venue subscription; leaving the venue happens on drop
pub struct VenueReceiver {
    venue_id: i64,
    rx: broadcast::Receiver<LiveEvent>,
    hub: VenueHub,
}

impl VenueReceiver {
    pub fn venue_id(&self) -> i64 {
        self.venue_id
    }

    pub async fn recv(&mut self) -> Result<LiveEvent, broadcast::error::RecvError> {
        self.rx.recv().await
    }

    /// Skip to the newest position after lagging behind
    pub fn resubscribe(&mut self) {
        self.rx = self.rx.resubscribe();
    }
}

impl Drop for VenueReceiver {
    fn drop(&mut self) {
        self.hub.release(self.venue_id);
    }
}
