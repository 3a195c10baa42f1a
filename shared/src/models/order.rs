//! Order Model

use serde::{Deserialize, Serialize};

use crate::order::{OptionSelection, OrderStatus};

/// Order header
///
/// Immutable after creation except for `status`, `staff_notes` and
/// `cancellation_reason`. `total` is computed once at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub venue_id: i64,
    pub table_id: Option<i64>,
    /// Anonymous customer session
    pub device_id: Option<String>,
    #[cfg_attr(feature = "db", sqlx(try_from = "String"))]
    pub status: OrderStatus,
    /// Total amount in currency unit
    pub total: f64,
    /// Party size
    pub pax: Option<i32>,
    pub notes: Option<String>,
    pub staff_notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Order line with a price/name snapshot taken at order time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    /// `None` once the underlying menu item has been deleted
    pub menu_item_id: Option<i64>,
    pub name: String,
    pub quantity: i32,
    /// Unit price in currency unit, option deltas included
    pub unit_price: f64,
    pub notes: Option<String>,
    #[cfg_attr(feature = "db", sqlx(try_from = "String"))]
    pub options: OptionSelection,
}

/// Order with its line items
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}
