//! Order endpoint contracts
//!
//! Requests and responses of the order HTTP API, camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::OrderStatus;

// =============================================================================
// Creation
// =============================================================================

/// Place a new order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub venue_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<i64>,
    /// Anonymous customer session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pax: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
}

/// One requested line
///
/// `options_json` is kept raw here and normalized by the order service so a
/// malformed payload surfaces as `InvalidOptionPayload` instead of a generic
/// body rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub item_id: i64,
    pub quantity: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(
        default,
        alias = "options",
        alias = "selectedOptions",
        skip_serializing_if = "Value::is_null"
    )]
    pub options_json: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: i64,
    pub status: OrderStatus,
    pub total: f64,
    pub created_at: i64,
}

// =============================================================================
// Staff mutations
// =============================================================================

/// Move an order to another status
///
/// `new_status` stays a string so unknown values are rejected by the state
/// machine parser with a validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub new_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdated {
    pub order_id: i64,
    pub status: OrderStatus,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffNotesRequest {
    #[serde(default)]
    pub staff_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffNotesUpdated {
    pub order_id: i64,
    pub staff_notes: Option<String>,
    pub updated_at: i64,
}

// =============================================================================
// Listing
// =============================================================================

/// Query string of `GET /api/venues/{venueId}/orders`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Created at or after (millis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
    /// Created before (millis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<i64>,
    /// Only NEW, PREPARING and READY orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_request_accepts_option_aliases() {
        let req: CreateOrderRequest = serde_json::from_value(json!({
            "venueId": 1,
            "items": [
                {"itemId": 10, "quantity": 2, "optionsJson": "[]"},
                {"itemId": 11, "quantity": 1, "selectedOptions": [{"optionId": 3, "values": []}]},
                {"itemId": 12, "quantity": 1}
            ]
        }))
        .unwrap();
        assert_eq!(req.items.len(), 3);
        assert_eq!(req.items[0].options_json, json!("[]"));
        assert!(req.items[1].options_json.is_array());
        assert!(req.items[2].options_json.is_null());
        assert!(req.table_id.is_none());
    }

    #[test]
    fn responses_use_camel_case() {
        let created = OrderCreated {
            order_id: 7,
            status: OrderStatus::New,
            total: 240.0,
            created_at: 1,
        };
        let json = serde_json::to_value(&created).unwrap();
        assert_eq!(json["orderId"], 7);
        assert_eq!(json["status"], "NEW");
        assert_eq!(json["createdAt"], 1);
    }
}
