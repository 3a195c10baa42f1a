//! Status diffing between two order fetches

use std::collections::{HashMap, HashSet};

use shared::OrderStatus;
use shared::models::Order;

/// A status change observed between two fetches of the same order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub order_id: i64,
    pub venue_id: i64,
    pub table_id: Option<i64>,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Last known status of every order still in play
///
/// Only active orders are tracked. An order seen for the first time is
/// recorded silently; a terminal status is reported once and then dropped.
#[derive(Debug, Default)]
pub struct OrderTracker {
    known: HashMap<i64, OrderStatus>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff a fresh fetch against the known statuses.
    ///
    /// Ids absent from `orders` are pruned.
    pub fn reconcile<'a>(
        &mut self,
        orders: impl IntoIterator<Item = &'a Order>,
    ) -> Vec<StatusTransition> {
        let mut transitions = Vec::new();
        let mut next = HashMap::with_capacity(self.known.len());

        for order in orders {
            if let Some(&from) = self.known.get(&order.id)
                && from != order.status
            {
                transitions.push(StatusTransition {
                    order_id: order.id,
                    venue_id: order.venue_id,
                    table_id: order.table_id,
                    from,
                    to: order.status,
                });
            }
            if order.status.is_active() {
                next.insert(order.id, order.status);
            }
        }

        self.known = next;
        transitions
    }

    /// Tracked ids absent from `orders`, ascending
    ///
    /// These left the fetched set and need a direct lookup before
    /// [`reconcile`](Self::reconcile) prunes them.
    pub fn missing_from<'a>(&self, orders: impl IntoIterator<Item = &'a Order>) -> Vec<i64> {
        let present: HashSet<i64> = orders.into_iter().map(|order| order.id).collect();
        let mut missing: Vec<i64> = self
            .known
            .keys()
            .copied()
            .filter(|id| !present.contains(id))
            .collect();
        missing.sort_unstable();
        missing
    }

    pub fn status_of(&self, order_id: i64) -> Option<OrderStatus> {
        self.known.get(&order_id).copied()
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub fn clear(&mut self) {
        self.known.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::order;

    fn orders(list: &[(i64, OrderStatus)]) -> Vec<Order> {
        list.iter()
            .map(|&(id, status)| order(id, 1, status, None))
            .collect()
    }

    #[test]
    fn first_sighting_is_silent() {
        let mut tracker = OrderTracker::new();
        let transitions = tracker.reconcile(&orders(&[
            (1, OrderStatus::New),
            (2, OrderStatus::Ready),
        ]));

        assert!(transitions.is_empty());
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.status_of(2), Some(OrderStatus::Ready));
    }

    #[test]
    fn reports_only_real_changes() {
        let mut tracker = OrderTracker::new();
        tracker.reconcile(&orders(&[(1, OrderStatus::New), (2, OrderStatus::New)]));

        let transitions =
            tracker.reconcile(&orders(&[(1, OrderStatus::Preparing), (2, OrderStatus::New)]));

        assert_eq!(
            transitions,
            vec![StatusTransition {
                order_id: 1,
                venue_id: 1,
                table_id: Some(10),
                from: OrderStatus::New,
                to: OrderStatus::Preparing,
            }]
        );

        // Same fetch again: nothing new
        let again =
            tracker.reconcile(&orders(&[(1, OrderStatus::Preparing), (2, OrderStatus::New)]));
        assert!(again.is_empty());
    }

    #[test]
    fn prunes_orders_missing_from_the_fetch() {
        let mut tracker = OrderTracker::new();
        tracker.reconcile(&orders(&[(1, OrderStatus::New), (2, OrderStatus::Preparing)]));

        tracker.reconcile(&orders(&[(2, OrderStatus::Preparing)]));
        assert_eq!(tracker.status_of(1), None);
        assert_eq!(tracker.len(), 1);

        // Coming back is a first sighting again
        let transitions =
            tracker.reconcile(&orders(&[(1, OrderStatus::Ready), (2, OrderStatus::Preparing)]));
        assert!(transitions.is_empty());
    }

    #[test]
    fn terminal_status_is_reported_once_then_dropped() {
        let mut tracker = OrderTracker::new();
        tracker.reconcile(&orders(&[(1, OrderStatus::Ready), (2, OrderStatus::New)]));

        let transitions =
            tracker.reconcile(&orders(&[(1, OrderStatus::Served), (2, OrderStatus::Cancelled)]));
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].to, OrderStatus::Served);
        assert_eq!(transitions[1].from, OrderStatus::New);
        assert_eq!(transitions[1].to, OrderStatus::Cancelled);
        assert!(tracker.is_empty());

        let later =
            tracker.reconcile(&orders(&[(1, OrderStatus::Served), (2, OrderStatus::Cancelled)]));
        assert!(later.is_empty());
    }

    #[test]
    fn missing_from_lists_tracked_ids_outside_the_fetch() {
        let mut tracker = OrderTracker::new();
        tracker.reconcile(&orders(&[
            (3, OrderStatus::New),
            (1, OrderStatus::Preparing),
            (2, OrderStatus::Ready),
        ]));

        let fetched = orders(&[(2, OrderStatus::Ready), (9, OrderStatus::New)]);
        assert_eq!(tracker.missing_from(&fetched), vec![1, 3]);
        assert_eq!(tracker.missing_from(&orders(&[])).len(), 3);
        assert!(OrderTracker::new().missing_from(&fetched).is_empty());
    }

    #[test]
    fn terminal_orders_seen_first_are_not_tracked() {
        let mut tracker = OrderTracker::new();
        tracker.reconcile(&orders(&[(5, OrderStatus::Served)]));
        assert!(tracker.is_empty());
    }
}
