//! Order endpoints
//!
//! - POST   /api/orders                     place an order
//! - GET    /api/orders/{id}                order with lines
//! - DELETE /api/orders/{id}                administrative removal
//! - PATCH  /api/orders/{id}/status         state machine transition
//! - PATCH  /api/orders/{id}/staff-notes    staff notes overwrite
//! - GET    /api/venues/{venueId}/orders    filtered venue listing

use axum::{
    Json, Router,
    extract::State,
    routing::{get, patch, post},
};
use shared::models::OrderDetail;
use shared::order::{
    CreateOrderRequest, OrderCreated, OrderListQuery, StaffNotesRequest, StaffNotesUpdated,
    StatusUpdateRequest, StatusUpdated,
};

use super::ApiResult;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", post(create))
        .route("/api/orders/{id}", get(get_by_id).delete(delete))
        .route("/api/orders/{id}/status", patch(update_status))
        .route("/api/orders/{id}/staff-notes", patch(update_staff_notes))
        .route("/api/venues/{venue_id}/orders", get(list_by_venue))
}

async fn create(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> ApiResult<OrderCreated> {
    Ok(Json(state.orders.create_order(req).await?))
}

async fn get_by_id(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<OrderDetail> {
    Ok(Json(state.orders.get_order(id).await?))
}

async fn delete(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<bool> {
    state.orders.delete_order(id).await?;
    Ok(Json(true))
}

async fn update_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<StatusUpdateRequest>,
) -> ApiResult<StatusUpdated> {
    Ok(Json(state.orders.update_status(id, req).await?))
}

async fn update_staff_notes(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<StaffNotesRequest>,
) -> ApiResult<StaffNotesUpdated> {
    Ok(Json(
        state.orders.update_staff_notes(id, req.staff_notes).await?,
    ))
}

async fn list_by_venue(
    State(state): State<AppState>,
    ApiPath(venue_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<OrderListQuery>,
) -> ApiResult<Vec<OrderDetail>> {
    Ok(Json(state.orders.list_orders(venue_id, query).await?))
}
