//! Menu Repository
//!
//! Read side of the merchant menu: items with their live price and
//! availability, options with nested values.

use std::collections::HashMap;

use async_trait::async_trait;
use shared::models::{ItemOption, ItemOptionValue, MenuItem};
use sqlx::SqlitePool;

use super::RepoResult;

#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn find_item(&self, item_id: i64) -> RepoResult<Option<MenuItem>>;

    /// Options of an item, each with its values populated
    async fn find_item_options(&self, item_id: i64) -> RepoResult<Vec<ItemOption>>;
}

#[derive(Clone)]
pub struct SqliteMenuRepository {
    pool: SqlitePool,
}

impl SqliteMenuRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MenuRepository for SqliteMenuRepository {
    async fn find_item(&self, item_id: i64) -> RepoResult<Option<MenuItem>> {
        let item = sqlx::query_as::<_, MenuItem>(
            "SELECT id, venue_id, name, price, is_available FROM menu_items WHERE id = ?",
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn find_item_options(&self, item_id: i64) -> RepoResult<Vec<ItemOption>> {
        let mut options = sqlx::query_as::<_, ItemOption>(
            "SELECT id, item_id, name, is_required, is_multi_select FROM item_options \
             WHERE item_id = ? ORDER BY sort_order, id",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        if options.is_empty() {
            return Ok(options);
        }

        let values = sqlx::query_as::<_, ItemOptionValue>(
            "SELECT v.id, v.option_id, v.label, v.price_delta FROM item_option_values v \
             JOIN item_options o ON o.id = v.option_id \
             WHERE o.item_id = ? ORDER BY v.sort_order, v.id",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_option: HashMap<i64, Vec<ItemOptionValue>> = HashMap::new();
        for value in values {
            by_option.entry(value.option_id).or_default().push(value);
        }
        for option in &mut options {
            option.values = by_option.remove(&option.id).unwrap_or_default();
        }
        Ok(options)
    }
}
