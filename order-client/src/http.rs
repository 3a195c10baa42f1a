//! HTTP client for the order endpoints

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::ApiResponse;
use shared::models::OrderDetail;
use shared::order::{
    CreateOrderRequest, OrderCreated, OrderListQuery, StaffNotesRequest, StaffNotesUpdated,
    StatusUpdateRequest, StatusUpdated,
};
use shared::OrderStatus;

use crate::{ClientConfig, ClientError, ClientResult};

/// Typed wrapper over the order server REST API
#[derive(Debug, Clone)]
pub struct OrderApi {
    client: Client,
    base_url: String,
}

impl OrderApi {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Place a customer order
    pub async fn create_order(&self, request: &CreateOrderRequest) -> ClientResult<OrderCreated> {
        let response = self
            .client
            .post(self.url("api/orders"))
            .json(request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn get_order(&self, order_id: i64) -> ClientResult<OrderDetail> {
        let response = self
            .client
            .get(self.url(&format!("api/orders/{order_id}")))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Orders of a venue, newest first
    pub async fn list_venue_orders(
        &self,
        venue_id: i64,
        filter: &OrderListQuery,
    ) -> ClientResult<Vec<OrderDetail>> {
        let response = self
            .client
            .get(self.url(&format!("api/venues/{venue_id}/orders")))
            .query(filter)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn update_status(
        &self,
        order_id: i64,
        new_status: OrderStatus,
        cancellation_reason: Option<String>,
    ) -> ClientResult<StatusUpdated> {
        let request = StatusUpdateRequest {
            new_status: new_status.to_string(),
            cancellation_reason,
        };
        let response = self
            .client
            .patch(self.url(&format!("api/orders/{order_id}/status")))
            .json(&request)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn update_staff_notes(
        &self,
        order_id: i64,
        staff_notes: Option<String>,
    ) -> ClientResult<StaffNotesUpdated> {
        let response = self
            .client
            .patch(self.url(&format!("api/orders/{order_id}/staff-notes")))
            .json(&StaffNotesRequest { staff_notes })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Decode a success body, or turn the error envelope back into an `AppError`
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            let envelope = serde_json::from_str::<ApiResponse<()>>(&text)
                .ok()
                .and_then(ApiResponse::into_error);
            return match envelope {
                Some(err) => Err(ClientError::Api(err)),
                None => Err(ClientError::InvalidResponse(format!("{status}: {text}"))),
            };
        }

        response.json().await.map_err(Into::into)
    }
}
