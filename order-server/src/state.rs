//! Application state

use std::sync::Arc;

use crate::config::Config;
use crate::db::DbService;
use crate::error::BoxError;
use crate::live::VenueHub;
use crate::orders::OrderService;
use crate::push::{NoopPushNotifier, PushNotifier, WebhookPushNotifier};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: DbService,
    pub orders: OrderService,
    pub hub: VenueHub,
}

impl AppState {
    /// Open the database and wire services from configuration
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let db = DbService::new(&config.database_url).await?;

        let push: Arc<dyn PushNotifier> = match &config.push_webhook_url {
            Some(url) => {
                tracing::info!(url = %url, "Staff push via webhook");
                Arc::new(WebhookPushNotifier::new(url.clone())?)
            }
            None => {
                tracing::info!("PUSH_WEBHOOK_URL not set, staff push disabled");
                Arc::new(NoopPushNotifier)
            }
        };

        Ok(Self::with_parts(db, VenueHub::new(config.max_ws_per_venue), push))
    }

    pub fn with_parts(db: DbService, hub: VenueHub, push: Arc<dyn PushNotifier>) -> Self {
        let orders = OrderService::with_db(&db, hub.clone(), push);
        Self { db, orders, hub }
    }
}
