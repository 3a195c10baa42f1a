//! OrderService: order creation and status propagation
//!
//! Every check runs before the single transactional write, so a rejected
//! order leaves nothing behind. Events go to the venue hub after a write
//! succeeds; staff push is spawned and never awaited.

use std::str::FromStr;
use std::sync::Arc;

use shared::error::{AppError, ErrorCode};
use shared::live::{LiveEvent, OrderSignal};
use shared::models::{DiningTable, MenuItem, Order, OrderDetail, OrderItem, Venue};
use shared::order::{
    CreateOrderRequest, OptionSelection, OrderCreated, OrderLineRequest, OrderListQuery,
    OrderStatus, StaffNotesUpdated, StatusUpdateRequest, StatusUpdated,
};
use shared::util::{now_millis, snowflake_id};

use super::money;
use crate::db::{
    DbService, MenuRepository, OrderFilter, OrderRepository, RepoError, VenueRepository,
};
use crate::error::{ServiceError, ServiceResult};
use crate::live::VenueHub;
use crate::push::{PushNotifier, PushPayload};

/// Maximum length of free-text fields (notes, staff notes, reasons)
const MAX_NOTE_LEN: usize = 500;

#[derive(Clone)]
pub struct OrderService {
    venues: Arc<dyn VenueRepository>,
    menu: Arc<dyn MenuRepository>,
    orders: Arc<dyn OrderRepository>,
    hub: VenueHub,
    push: Arc<dyn PushNotifier>,
}

impl OrderService {
    pub fn new(
        venues: Arc<dyn VenueRepository>,
        menu: Arc<dyn MenuRepository>,
        orders: Arc<dyn OrderRepository>,
        hub: VenueHub,
        push: Arc<dyn PushNotifier>,
    ) -> Self {
        Self {
            venues,
            menu,
            orders,
            hub,
            push,
        }
    }

    /// Service over the SQLite repositories
    pub fn with_db(db: &DbService, hub: VenueHub, push: Arc<dyn PushNotifier>) -> Self {
        Self::new(
            Arc::new(db.venues()),
            Arc::new(db.menu()),
            Arc::new(db.orders()),
            hub,
            push,
        )
    }

    pub fn hub(&self) -> &VenueHub {
        &self.hub
    }

    // ========================================================================
    // Creation
    // ========================================================================

    pub async fn create_order(&self, req: CreateOrderRequest) -> ServiceResult<OrderCreated> {
        if req.items.is_empty() {
            return Err(AppError::new(ErrorCode::OrderEmpty).into());
        }
        validate_text(req.notes.as_deref(), "notes")?;
        if let Some(pax) = req.pax
            && pax < 1
        {
            return Err(AppError::validation(format!("Party size must be at least 1, got {pax}"))
                .with_detail("field", "pax")
                .into());
        }

        let venue = self.find_venue(req.venue_id).await?;

        let table = match req.table_id {
            Some(table_id) => Some(self.resolve_table(venue.id, table_id).await?),
            None => None,
        };

        let order_id = snowflake_id();
        let mut items = Vec::with_capacity(req.items.len());
        let mut priced = Vec::with_capacity(req.items.len());
        for line in req.items {
            let (item, unit_price) = self.price_line(venue.id, order_id, line).await?;
            priced.push((unit_price, item.quantity));
            items.push(item);
        }

        let now = now_millis();
        let order = Order {
            id: order_id,
            venue_id: venue.id,
            table_id: table.as_ref().map(|t| t.id),
            device_id: req.device_id.filter(|d| !d.trim().is_empty()),
            status: OrderStatus::New,
            total: money::to_f64(money::order_total(priced)),
            pax: req.pax,
            notes: req.notes,
            staff_notes: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        let detail = OrderDetail { order, items };
        self.orders.save(&detail).await?;

        let order = detail.order;
        tracing::info!(
            order_id = order.id,
            venue_id = order.venue_id,
            total = order.total,
            lines = detail.items.len(),
            "Order created"
        );

        self.hub
            .publish(LiveEvent::order_created(order.venue_id, signal(&order)));
        self.spawn_push(PushPayload::new_order(
            order.venue_id,
            order.id,
            table.as_ref(),
            order.total,
        ));

        Ok(OrderCreated {
            order_id: order.id,
            status: order.status,
            total: order.total,
            created_at: order.created_at,
        })
    }

    async fn resolve_table(&self, venue_id: i64, table_id: i64) -> ServiceResult<DiningTable> {
        self.venues
            .find_table(table_id)
            .await?
            .filter(|t| t.venue_id == venue_id && t.is_active)
            .ok_or_else(|| AppError::table_not_found(table_id).into())
    }

    /// Validate one requested line and capture its price snapshot
    async fn price_line(
        &self,
        venue_id: i64,
        order_id: i64,
        line: OrderLineRequest,
    ) -> ServiceResult<(OrderItem, rust_decimal::Decimal)> {
        let item: MenuItem = self
            .menu
            .find_item(line.item_id)
            .await?
            .filter(|item| item.venue_id == venue_id)
            .ok_or_else(|| AppError::menu_item_not_found(line.item_id))?;

        if !item.is_available {
            return Err(AppError::item_unavailable(item.id, &item.name).into());
        }
        money::validate_quantity(line.quantity, &item.name)?;
        validate_text(line.notes.as_deref(), "notes")?;

        let selection = OptionSelection::from_value(line.options_json)
            .map_err(|e| e.with_detail("item_id", item.id))?;

        // Required options are enforced whether or not a selection was sent
        let options = self.menu.find_item_options(item.id).await?;
        if let Some(missing) = options
            .iter()
            .find(|opt| opt.is_required && !selection.includes_option(opt.id))
        {
            return Err(AppError::required_option_missing(&missing.name, &item.name).into());
        }

        let unit_price = money::unit_price(item.price, &selection);
        let order_item = OrderItem {
            id: snowflake_id(),
            order_id,
            menu_item_id: Some(item.id),
            name: item.name,
            quantity: line.quantity,
            unit_price: money::to_f64(unit_price),
            notes: line.notes,
            options: selection,
        };
        Ok((order_item, unit_price))
    }

    fn spawn_push(&self, payload: PushPayload) {
        let push = Arc::clone(&self.push);
        tokio::spawn(async move {
            if let Err(e) = push.send_to_venue(payload.venue_id, &payload).await {
                tracing::warn!(
                    venue_id = payload.venue_id,
                    order_id = payload.order_id,
                    error = %e,
                    "Push notification failed"
                );
            }
        });
    }

    // ========================================================================
    // Staff mutations
    // ========================================================================

    /// Move an order along the state machine
    ///
    /// The transition is checked against the status read here and then
    /// written unconditionally: two concurrent requests that both saw the
    /// same status both succeed and the last write wins.
    pub async fn update_status(
        &self,
        order_id: i64,
        req: StatusUpdateRequest,
    ) -> ServiceResult<StatusUpdated> {
        let target = OrderStatus::from_str(&req.new_status)?;
        validate_text(req.cancellation_reason.as_deref(), "cancellationReason")?;

        let order = self.load_order(order_id).await?.order;
        if !order.status.can_transition_to(target) {
            return Err(AppError::invalid_transition(order.status, target).into());
        }

        let reason = match target {
            OrderStatus::Cancelled => req
                .cancellation_reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty()),
            _ => None,
        };
        let now = now_millis();
        self.orders
            .update_status(order_id, target, reason, now)
            .await
            .map_err(|e| not_found_as_order(e, order_id))?;

        tracing::info!(
            order_id,
            venue_id = order.venue_id,
            from = %order.status,
            to = %target,
            "Order status changed"
        );

        let changed = Order {
            status: target,
            ..order
        };
        self.hub
            .publish(LiveEvent::order_status_changed(changed.venue_id, signal(&changed)));

        Ok(StatusUpdated {
            order_id,
            status: target,
            updated_at: now,
        })
    }

    /// Overwrite staff notes; dashboard-internal, nothing is broadcast
    pub async fn update_staff_notes(
        &self,
        order_id: i64,
        staff_notes: Option<String>,
    ) -> ServiceResult<StaffNotesUpdated> {
        validate_text(staff_notes.as_deref(), "staffNotes")?;
        let staff_notes = staff_notes.filter(|n| !n.trim().is_empty());

        let now = now_millis();
        self.orders
            .update_staff_notes(order_id, staff_notes.as_deref(), now)
            .await
            .map_err(|e| not_found_as_order(e, order_id))?;

        tracing::debug!(order_id, "Staff notes updated");
        Ok(StaffNotesUpdated {
            order_id,
            staff_notes,
            updated_at: now,
        })
    }

    // ========================================================================
    // Reads / administration
    // ========================================================================

    /// Active venue or `VenueNotFound`
    pub async fn find_venue(&self, venue_id: i64) -> ServiceResult<Venue> {
        self.venues
            .find_venue(venue_id)
            .await?
            .filter(|v| v.is_active)
            .ok_or_else(|| AppError::venue_not_found(venue_id).into())
    }

    pub async fn get_order(&self, order_id: i64) -> ServiceResult<OrderDetail> {
        self.load_order(order_id).await
    }

    pub async fn list_orders(
        &self,
        venue_id: i64,
        query: OrderListQuery,
    ) -> ServiceResult<Vec<OrderDetail>> {
        let status = query
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(OrderStatus::from_str)
            .transpose()?;

        let filter = OrderFilter {
            status,
            device_id: query.device_id.filter(|d| !d.is_empty()),
            since: query.since,
            until: query.until,
            active_only: query.active.unwrap_or(false),
            limit: query
                .limit
                .unwrap_or(OrderFilter::DEFAULT_LIMIT)
                .clamp(1, OrderFilter::MAX_LIMIT),
        };
        Ok(self.orders.find_by_venue(venue_id, &filter).await?)
    }

    /// Administrative removal, outside the order lifecycle
    pub async fn delete_order(&self, order_id: i64) -> ServiceResult<()> {
        if !self.orders.delete(order_id).await? {
            return Err(AppError::order_not_found(order_id).into());
        }
        tracing::warn!(order_id, "Order deleted");
        Ok(())
    }

    async fn load_order(&self, order_id: i64) -> ServiceResult<OrderDetail> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::order_not_found(order_id).into())
    }
}

fn signal(order: &Order) -> OrderSignal {
    OrderSignal {
        order_id: order.id,
        status: order.status,
        table_id: order.table_id,
        device_id: order.device_id.clone(),
    }
}

fn not_found_as_order(err: RepoError, order_id: i64) -> ServiceError {
    match err {
        RepoError::NotFound(_) => AppError::order_not_found(order_id).into(),
        other => other.into(),
    }
}

fn validate_text(value: Option<&str>, field: &str) -> Result<(), AppError> {
    match value {
        Some(text) if text.chars().count() > MAX_NOTE_LEN => Err(AppError::with_message(
            ErrorCode::ValueOutOfRange,
            format!("{field} is too long (max {MAX_NOTE_LEN} characters)"),
        )
        .with_detail("field", field)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests;
