//! Order refresh loop of the customer app and the KDS
//!
//! Re-fetches the active orders on a fixed poll interval and whenever a live
//! event for the watched venue arrives, then runs the result through the
//! [`OrderTracker`] and the [`NotificationService`]. Tracked orders that left
//! the active set are looked up one by one, so moves to SERVED or CANCELLED
//! are still reported. The poll keeps working when the live stream is gone.

use std::time::Duration;

use shared::LiveEvent;
use shared::models::Order;
use shared::order::OrderListQuery;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::notify::{NotificationService, PreferenceStore};
use crate::tracker::{OrderTracker, StatusTransition};
use crate::{ClientConfig, ClientResult, OrderApi};

/// Active orders fetched per refresh, the server's page maximum
const FETCH_LIMIT: i64 = 500;

/// Which orders a watcher follows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub venue_id: i64,
    /// Customer session; `None` follows the whole venue (KDS)
    pub device_id: Option<String>,
}

impl WatchTarget {
    pub fn venue(venue_id: i64) -> Self {
        Self {
            venue_id,
            device_id: None,
        }
    }

    pub fn device(venue_id: i64, device_id: impl Into<String>) -> Self {
        Self {
            venue_id,
            device_id: Some(device_id.into()),
        }
    }

    /// Whether `event` may concern the watched orders
    pub fn matches(&self, event: &LiveEvent) -> bool {
        if event.venue_id != self.venue_id {
            return false;
        }
        match (&self.device_id, &event.data.device_id) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => true,
        }
    }
}

pub struct OrderWatcher<S: PreferenceStore> {
    api: OrderApi,
    target: WatchTarget,
    poll_interval: Duration,
    tracker: OrderTracker,
    notifier: NotificationService<S>,
    events: Option<mpsc::Receiver<LiveEvent>>,
    shutdown: CancellationToken,
}

impl<S: PreferenceStore> OrderWatcher<S> {
    pub fn new(
        api: OrderApi,
        config: &ClientConfig,
        target: WatchTarget,
        notifier: NotificationService<S>,
    ) -> Self {
        Self {
            api,
            target,
            poll_interval: config.poll_interval,
            tracker: OrderTracker::new(),
            notifier,
            events: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Refresh on live events as well as on the poll
    pub fn with_events(mut self, events: mpsc::Receiver<LiveEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Cancel to stop [`run`](Self::run)
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    pub fn tracker(&self) -> &OrderTracker {
        &self.tracker
    }

    pub fn notifier_mut(&mut self) -> &mut NotificationService<S> {
        &mut self.notifier
    }

    /// Fetch, diff against the last fetch and notify every transition
    ///
    /// On error the tracker is left untouched.
    pub async fn refresh(&mut self) -> ClientResult<Vec<StatusTransition>> {
        let filter = OrderListQuery {
            device_id: self.target.device_id.clone(),
            active: Some(true),
            limit: Some(FETCH_LIMIT),
            ..Default::default()
        };
        let mut orders: Vec<Order> = self
            .api
            .list_venue_orders(self.target.venue_id, &filter)
            .await?
            .into_iter()
            .map(|detail| detail.order)
            .collect();

        // Finished, or active but beyond the fetched page
        for order_id in self.tracker.missing_from(&orders) {
            match self.api.get_order(order_id).await {
                Ok(detail) => orders.push(detail.order),
                Err(e) if e.api_error().is_some_and(|err| err.is_not_found()) => {
                    tracing::debug!(order_id, "Tracked order no longer exists");
                }
                Err(e) => return Err(e),
            }
        }

        let transitions = self.tracker.reconcile(&orders);
        for transition in &transitions {
            tracing::info!(
                order_id = transition.order_id,
                from = %transition.from,
                to = %transition.to,
                "Order status changed"
            );
            self.notifier.notify(transition).await;
        }
        Ok(transitions)
    }

    /// Initialize notifications, loop until cancelled, then tear down.
    ///
    /// The first poll fires immediately and only primes the tracker.
    pub async fn run(mut self) -> ClientResult<()> {
        self.notifier.init().await?;
        tracing::info!(
            venue_id = self.target.venue_id,
            device_id = ?self.target.device_id,
            "Order watcher started"
        );

        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                _ = poll.tick() => self.refresh_logged("poll").await,

                event = next_event(&mut self.events) => match event {
                    Some(event) => {
                        if self.target.matches(&event) {
                            self.refresh_logged("live").await;
                            poll.reset();
                        }
                    }
                    None => {
                        tracing::debug!("Live events closed, polling only");
                        self.events = None;
                    }
                },
            }
        }

        tracing::info!(venue_id = self.target.venue_id, "Order watcher stopped");
        self.notifier.teardown().await
    }

    async fn refresh_logged(&mut self, trigger: &'static str) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(trigger, venue_id = self.target.venue_id, "Order refresh failed: {e}");
        }
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<LiveEvent>>) -> Option<LiveEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
