//! Order Repository
//!
//! Orders and their lines are written together in one transaction. After
//! creation only `status`, `staff_notes`, `cancellation_reason` and
//! `updated_at` change, through the dedicated update methods.

use std::collections::HashMap;

use async_trait::async_trait;
use shared::models::{Order, OrderDetail, OrderItem};
use shared::order::OrderStatus;
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};

const ORDER_COLUMNS: &str = "id, venue_id, table_id, device_id, status, total, pax, notes, \
     staff_notes, cancellation_reason, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, order_id, menu_item_id, name, quantity, unit_price, notes, options";

/// Venue order listing filter
#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub device_id: Option<String>,
    /// Inclusive lower bound on `created_at` (millis)
    pub since: Option<i64>,
    /// Exclusive upper bound on `created_at` (millis)
    pub until: Option<i64>,
    /// NEW, PREPARING and READY only
    pub active_only: bool,
    pub limit: i64,
}

impl OrderFilter {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 500;
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            status: None,
            device_id: None,
            since: None,
            until: None,
            active_only: false,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert or replace the order together with all of its items
    async fn save(&self, detail: &OrderDetail) -> RepoResult<()>;

    async fn find_by_id(&self, order_id: i64) -> RepoResult<Option<OrderDetail>>;

    /// Newest first
    async fn find_by_venue(&self, venue_id: i64, filter: &OrderFilter)
    -> RepoResult<Vec<OrderDetail>>;

    /// Unconditional overwrite; `cancellation_reason` is kept when `None`
    async fn update_status(
        &self,
        order_id: i64,
        status: OrderStatus,
        cancellation_reason: Option<&str>,
        updated_at: i64,
    ) -> RepoResult<()>;

    async fn update_staff_notes(
        &self,
        order_id: i64,
        staff_notes: Option<&str>,
        updated_at: i64,
    ) -> RepoResult<()>;

    /// Returns whether a row was removed
    async fn delete(&self, order_id: i64) -> RepoResult<bool>;
}

#[derive(Clone)]
pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_items(&self, order_ids: &[i64]) -> RepoResult<HashMap<i64, Vec<OrderItem>>> {
        let mut by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        if order_ids.is_empty() {
            return Ok(by_order);
        }

        let placeholders = vec!["?"; order_ids.len()].join(", ");
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id IN ({placeholders}) \
             ORDER BY order_id, sort_order"
        );
        let mut query = sqlx::query_as::<_, OrderItem>(&sql);
        for id in order_ids {
            query = query.bind(id);
        }
        for item in query.fetch_all(&self.pool).await? {
            by_order.entry(item.order_id).or_default().push(item);
        }
        Ok(by_order)
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn save(&self, detail: &OrderDetail) -> RepoResult<()> {
        let order = &detail.order;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, venue_id, table_id, device_id, status, total, pax, notes, \
                staff_notes, cancellation_reason, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
             ON CONFLICT(id) DO UPDATE SET venue_id = ?2, table_id = ?3, device_id = ?4, \
                status = ?5, total = ?6, pax = ?7, notes = ?8, staff_notes = ?9, \
                cancellation_reason = ?10, created_at = ?11, updated_at = ?12",
        )
        .bind(order.id)
        .bind(order.venue_id)
        .bind(order.table_id)
        .bind(order.device_id.as_deref())
        .bind(order.status.as_str())
        .bind(order.total)
        .bind(order.pax)
        .bind(order.notes.as_deref())
        .bind(order.staff_notes.as_deref())
        .bind(order.cancellation_reason.as_deref())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM order_items WHERE order_id = ?")
            .bind(order.id)
            .execute(&mut *tx)
            .await?;

        for (position, item) in detail.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, menu_item_id, name, quantity, unit_price, \
                    notes, options, sort_order) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(item.id)
            .bind(order.id)
            .bind(item.menu_item_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.notes.as_deref())
            .bind(item.options.to_json_string())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, order_id: i64) -> RepoResult<Option<OrderDetail>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?");
        let Some(order) = sqlx::query_as::<_, Order>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let items = self
            .load_items(&[order.id])
            .await?
            .remove(&order.id)
            .unwrap_or_default();
        Ok(Some(OrderDetail { order, items }))
    }

    async fn find_by_venue(
        &self,
        venue_id: i64,
        filter: &OrderFilter,
    ) -> RepoResult<Vec<OrderDetail>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE venue_id = ?1 \
               AND (?2 IS NULL OR status = ?2) \
               AND (?3 IS NULL OR device_id = ?3) \
               AND (?4 IS NULL OR created_at >= ?4) \
               AND (?5 IS NULL OR created_at < ?5) \
               AND (?6 = 0 OR status IN ('NEW', 'PREPARING', 'READY')) \
             ORDER BY created_at DESC, id DESC \
             LIMIT ?7"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(venue_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.device_id.as_deref())
            .bind(filter.since)
            .bind(filter.until)
            .bind(filter.active_only)
            .bind(filter.limit.clamp(1, OrderFilter::MAX_LIMIT))
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let mut items = self.load_items(&ids).await?;
        Ok(orders
            .into_iter()
            .map(|order| {
                let items = items.remove(&order.id).unwrap_or_default();
                OrderDetail { order, items }
            })
            .collect())
    }

    async fn update_status(
        &self,
        order_id: i64,
        status: OrderStatus,
        cancellation_reason: Option<&str>,
        updated_at: i64,
    ) -> RepoResult<()> {
        let rows = sqlx::query(
            "UPDATE orders SET status = ?1, \
                cancellation_reason = COALESCE(?2, cancellation_reason), updated_at = ?3 \
             WHERE id = ?4",
        )
        .bind(status.as_str())
        .bind(cancellation_reason)
        .bind(updated_at)
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        if rows.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("Order {order_id}")));
        }
        Ok(())
    }

    async fn update_staff_notes(
        &self,
        order_id: i64,
        staff_notes: Option<&str>,
        updated_at: i64,
    ) -> RepoResult<()> {
        let rows = sqlx::query("UPDATE orders SET staff_notes = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(staff_notes)
            .bind(updated_at)
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        if rows.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("Order {order_id}")));
        }
        Ok(())
    }

    async fn delete(&self, order_id: i64) -> RepoResult<bool> {
        let rows = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        Ok(rows.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures::{self, BURGER, TABLE, VENUE};
    use serde_json::json;
    use shared::order::OptionSelection;

    fn sample(id: i64, created_at: i64, status: OrderStatus, device: Option<&str>) -> OrderDetail {
        OrderDetail {
            order: Order {
                id,
                venue_id: VENUE,
                table_id: Some(TABLE),
                device_id: device.map(str::to_string),
                status,
                total: 240.0,
                pax: Some(2),
                notes: None,
                staff_notes: None,
                cancellation_reason: None,
                created_at,
                updated_at: created_at,
            },
            items: vec![OrderItem {
                id: id * 10,
                order_id: id,
                menu_item_id: Some(BURGER),
                name: "Burger".into(),
                quantity: 2,
                unit_price: 120.0,
                notes: Some("no onion".into()),
                options: OptionSelection::from_value(json!([{
                    "optionId": 1000, "optionName": "Size",
                    "values": [{"valueId": 1002, "valueLabel": "Large", "priceDelta": 20}]
                }]))
                .unwrap(),
            }],
        }
    }

    #[tokio::test]
    async fn save_and_reload_keeps_snapshot() {
        let db = fixtures::seeded().await;
        let repo = db.orders();
        let order = sample(1, 1_000, OrderStatus::New, Some("device-a"));
        repo.save(&order).await.unwrap();

        let loaded = repo.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(loaded.order.status, OrderStatus::New);
        assert_eq!(loaded.order.total, 240.0);
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].unit_price, 120.0);
        assert_eq!(loaded.items[0].options, order.items[0].options);

        // Saving again replaces lines instead of duplicating them
        repo.save(&order).await.unwrap();
        assert_eq!(repo.find_by_id(1).await.unwrap().unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn deleted_menu_item_keeps_order_line() {
        let db = fixtures::seeded().await;
        let repo = db.orders();
        repo.save(&sample(1, 1_000, OrderStatus::New, None))
            .await
            .unwrap();

        sqlx::query("DELETE FROM menu_items WHERE id = ?")
            .bind(BURGER)
            .execute(&db.pool)
            .await
            .unwrap();

        let loaded = repo.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(loaded.items[0].menu_item_id, None);
        assert_eq!(loaded.items[0].name, "Burger");
    }

    #[tokio::test]
    async fn venue_listing_filters() {
        let db = fixtures::seeded().await;
        let repo = db.orders();
        repo.save(&sample(1, 1_000, OrderStatus::New, Some("a")))
            .await
            .unwrap();
        repo.save(&sample(2, 2_000, OrderStatus::Served, Some("a")))
            .await
            .unwrap();
        repo.save(&sample(3, 3_000, OrderStatus::Ready, Some("b")))
            .await
            .unwrap();

        let all = repo
            .find_by_venue(VENUE, &OrderFilter::default())
            .await
            .unwrap();
        let ids: Vec<i64> = all.iter().map(|d| d.order.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert!(all.iter().all(|d| d.items.len() == 1));

        let active = OrderFilter {
            active_only: true,
            ..Default::default()
        };
        let ids: Vec<i64> = repo
            .find_by_venue(VENUE, &active)
            .await
            .unwrap()
            .iter()
            .map(|d| d.order.id)
            .collect();
        assert_eq!(ids, vec![3, 1]);

        let device_a_since = OrderFilter {
            device_id: Some("a".into()),
            since: Some(1_500),
            ..Default::default()
        };
        let found = repo.find_by_venue(VENUE, &device_a_since).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].order.id, 2);

        let ready = OrderFilter {
            status: Some(OrderStatus::Ready),
            until: Some(5_000),
            limit: 10,
            ..Default::default()
        };
        let found = repo.find_by_venue(VENUE, &ready).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].order.id, 3);

        assert!(repo
            .find_by_venue(99, &OrderFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn status_and_notes_updates() {
        let db = fixtures::seeded().await;
        let repo = db.orders();
        repo.save(&sample(1, 1_000, OrderStatus::New, None))
            .await
            .unwrap();

        repo.update_status(1, OrderStatus::Cancelled, Some("out of buns"), 5_000)
            .await
            .unwrap();
        repo.update_staff_notes(1, Some("refund at counter"), 6_000)
            .await
            .unwrap();

        let order = repo.find_by_id(1).await.unwrap().unwrap().order;
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.cancellation_reason.as_deref(), Some("out of buns"));
        assert_eq!(order.staff_notes.as_deref(), Some("refund at counter"));
        assert_eq!(order.updated_at, 6_000);

        assert!(matches!(
            repo.update_status(42, OrderStatus::Ready, None, 1).await,
            Err(RepoError::NotFound(_))
        ));
        assert!(matches!(
            repo.update_staff_notes(42, None, 1).await,
            Err(RepoError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_cascades_to_items() {
        let db = fixtures::seeded().await;
        let repo = db.orders();
        repo.save(&sample(1, 1_000, OrderStatus::New, None))
            .await
            .unwrap();

        assert!(repo.delete(1).await.unwrap());
        assert!(!repo.delete(1).await.unwrap());
        assert!(repo.find_by_id(1).await.unwrap().is_none());

        let (lines,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM order_items")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(lines, 0);
    }
}
