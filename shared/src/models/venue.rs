//! Venue and Dining Table Models

use serde::{Deserialize, Serialize};

/// A single physical café/restaurant location owned by a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub is_active: bool,
}

/// Dining table (QR codes point at one of these)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct DiningTable {
    pub id: i64,
    pub venue_id: i64,
    pub name: String,
    pub capacity: i32,
    pub is_active: bool,
}
