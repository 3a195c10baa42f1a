//! Shared setup for order-server integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use order_server::db::DbService;
use order_server::live::VenueHub;
use order_server::push::NoopPushNotifier;
use order_server::{AppState, api};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const VENUE: i64 = 1;
pub const OTHER_VENUE: i64 = 2;
pub const TABLE: i64 = 10;
pub const LATTE: i64 = 100;
pub const MILK: i64 = 1000;
pub const OAT: i64 = 1002;
pub const CROISSANT: i64 = 101;
pub const BAGEL: i64 = 200;

/// Corner Café: Latte 3.50 with required Milk (Whole +0, Oat +0.50),
/// Croissant 2.20. Harbour Bistro: Bagel 4.00.
pub async fn seed(db: &DbService) {
    let statements = [
        "INSERT INTO venues (id, tenant_id, name) VALUES (1, 1, 'Corner Café'), (2, 1, 'Harbour Bistro')",
        "INSERT INTO dining_tables (id, venue_id, name) VALUES (10, 1, 'T1')",
        "INSERT INTO menu_items (id, venue_id, name, price) VALUES \
            (100, 1, 'Latte', 3.5), (101, 1, 'Croissant', 2.2), (200, 2, 'Bagel', 4.0)",
        "INSERT INTO item_options (id, item_id, name, is_required) VALUES (1000, 100, 'Milk', 1)",
        "INSERT INTO item_option_values (id, option_id, label, price_delta) VALUES \
            (1001, 1000, 'Whole', 0), (1002, 1000, 'Oat', 0.5)",
    ];
    for sql in statements {
        sqlx::query(sql).execute(&db.pool).await.unwrap();
    }
}

pub async fn test_state(max_ws_per_venue: usize) -> AppState {
    let db = DbService::in_memory().await.unwrap();
    seed(&db).await;
    AppState::with_parts(db, VenueHub::new(max_ws_per_venue), Arc::new(NoopPushNotifier))
}

pub async fn test_app() -> Router {
    api::build_app(test_state(4).await)
}

pub fn oat_latte(quantity: i32) -> Value {
    json!({
        "itemId": LATTE,
        "quantity": quantity,
        "optionsJson": [{
            "optionId": MILK,
            "optionName": "Milk",
            "values": [{"valueId": OAT, "valueLabel": "Oat", "priceDelta": 0.5}]
        }]
    })
}

/// Send a JSON request through the router without a socket
pub async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let body = match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    };
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}
