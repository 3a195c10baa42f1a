//! Menu Item / Option Models

use serde::{Deserialize, Serialize};

/// Menu item with its live base price
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: i64,
    pub venue_id: i64,
    pub name: String,
    /// Base price in currency unit
    pub price: f64,
    pub is_available: bool,
}

/// Customization axis of a menu item (e.g. "Size")
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ItemOption {
    pub id: i64,
    pub item_id: i64,
    pub name: String,
    /// At least one value must be selected before the item can be ordered
    pub is_required: bool,
    pub is_multi_select: bool,

    // -- Relations (populated by application code, skipped by FromRow) --
    #[cfg_attr(feature = "db", sqlx(skip))]
    #[serde(default)]
    pub values: Vec<ItemOptionValue>,
}

/// Selectable choice of an option
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ItemOptionValue {
    pub id: i64,
    pub option_id: i64,
    pub label: String,
    /// Price adjustment in currency unit (positive=add, negative=subtract)
    pub price_delta: f64,
}
