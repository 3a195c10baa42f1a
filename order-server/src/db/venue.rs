//! Venue Repository

use async_trait::async_trait;
use shared::models::{DiningTable, Venue};
use sqlx::SqlitePool;

use super::RepoResult;

/// Venue and table lookup consumed by order creation
#[async_trait]
pub trait VenueRepository: Send + Sync {
    async fn find_venue(&self, venue_id: i64) -> RepoResult<Option<Venue>>;

    async fn find_table(&self, table_id: i64) -> RepoResult<Option<DiningTable>>;
}

#[derive(Clone)]
pub struct SqliteVenueRepository {
    pool: SqlitePool,
}

impl SqliteVenueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VenueRepository for SqliteVenueRepository {
    async fn find_venue(&self, venue_id: i64) -> RepoResult<Option<Venue>> {
        let venue = sqlx::query_as::<_, Venue>(
            "SELECT id, tenant_id, name, is_active FROM venues WHERE id = ?",
        )
        .bind(venue_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(venue)
    }

    async fn find_table(&self, table_id: i64) -> RepoResult<Option<DiningTable>> {
        let table = sqlx::query_as::<_, DiningTable>(
            "SELECT id, venue_id, name, capacity, is_active FROM dining_tables WHERE id = ?",
        )
        .bind(table_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(table)
    }
}
