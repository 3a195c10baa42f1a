//! Push dispatch to venue staff
//!
//! Best-effort: callers spawn the send and only log failures.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::models::DiningTable;
use thiserror::Error;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum PushError {
    #[error("Push request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Push endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Notification sent to the staff devices of a venue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub venue_id: i64,
    pub order_id: i64,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<i64>,
}

impl PushPayload {
    pub fn new_order(
        venue_id: i64,
        order_id: i64,
        table: Option<&DiningTable>,
        total: f64,
    ) -> Self {
        let body = match table {
            Some(table) => format!("Table {}: {total:.2}", table.name),
            None => format!("Takeaway: {total:.2}"),
        };
        Self {
            venue_id,
            order_id,
            title: "New order".to_string(),
            body,
            table_id: table.map(|t| t.id),
        }
    }
}

#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn send_to_venue(&self, venue_id: i64, payload: &PushPayload) -> Result<(), PushError>;
}

/// Posts the payload as JSON to a webhook
pub struct WebhookPushNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookPushNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl PushNotifier for WebhookPushNotifier {
    async fn send_to_venue(&self, venue_id: i64, payload: &PushPayload) -> Result<(), PushError> {
        let resp = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PushError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(venue_id, order_id = payload.order_id, "Push delivered");
        Ok(())
    }
}

/// Used when no push endpoint is configured
pub struct NoopPushNotifier;

#[async_trait]
impl PushNotifier for NoopPushNotifier {
    async fn send_to_venue(&self, venue_id: i64, payload: &PushPayload) -> Result<(), PushError> {
        tracing::trace!(venue_id, order_id = payload.order_id, "Push disabled, dropping");
        Ok(())
    }
}
