use super::*;
use crate::db::fixtures::{
    self, BURGER, DRESSING, EXTRA_DRESSING, LARGE, NO_DRESSING, OTHER_TABLE, OTHER_VENUE, PASTA,
    REGULAR, SALAD, SIZE, SOUP, TABLE, VENUE,
};
use crate::push::PushError;
use async_trait::async_trait;
use serde_json::{Value, json};
use shared::live::LiveEventKind;
use std::time::Duration;
use tokio::sync::{Barrier, mpsc};

/// Records payloads; fails every send when `fail` is set
struct RecordingPush {
    tx: mpsc::UnboundedSender<PushPayload>,
    fail: bool,
}

#[async_trait]
impl PushNotifier for RecordingPush {
    async fn send_to_venue(&self, _venue_id: i64, payload: &PushPayload) -> Result<(), PushError> {
        let _ = self.tx.send(payload.clone());
        if self.fail {
            return Err(PushError::Rejected {
                status: 500,
                body: "push gateway down".into(),
            });
        }
        Ok(())
    }
}

struct Harness {
    db: DbService,
    service: OrderService,
    pushes: mpsc::UnboundedReceiver<PushPayload>,
}

async fn harness_with(fail_push: bool) -> Harness {
    let db = fixtures::seeded().await;
    let (tx, pushes) = mpsc::unbounded_channel();
    let push = Arc::new(RecordingPush {
        tx,
        fail: fail_push,
    });
    let service = OrderService::with_db(&db, VenueHub::new(10), push);
    Harness {
        db,
        service,
        pushes,
    }
}

async fn harness() -> Harness {
    harness_with(false).await
}

fn size(value_id: i64, delta: f64) -> Value {
    json!([{
        "optionId": SIZE,
        "optionName": "Size",
        "values": [{"valueId": value_id, "valueLabel": "Size value", "priceDelta": delta}]
    }])
}

fn line(item_id: i64, quantity: i32, options: Value) -> OrderLineRequest {
    OrderLineRequest {
        item_id,
        quantity,
        notes: None,
        options_json: options,
    }
}

fn request(lines: Vec<OrderLineRequest>) -> CreateOrderRequest {
    CreateOrderRequest {
        venue_id: VENUE,
        table_id: Some(TABLE),
        device_id: Some("device-1".into()),
        pax: Some(2),
        notes: None,
        items: lines,
    }
}

async fn order_count(db: &DbService) -> i64 {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    n
}

async fn line_count(db: &DbService) -> i64 {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM order_items")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    n
}

fn status(s: &str) -> StatusUpdateRequest {
    StatusUpdateRequest {
        new_status: s.into(),
        cancellation_reason: None,
    }
}

fn app_error(err: ServiceError) -> AppError {
    err.into()
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn create_prices_lines_from_option_deltas() {
    let h = harness().await;
    let created = h
        .service
        .create_order(request(vec![line(BURGER, 2, size(LARGE, 20.0))]))
        .await
        .unwrap();

    assert_eq!(created.status, OrderStatus::New);
    assert_eq!(created.total, 240.0);

    let detail = h.service.get_order(created.order_id).await.unwrap();
    assert_eq!(detail.order.total, 240.0);
    assert_eq!(detail.order.table_id, Some(TABLE));
    assert_eq!(detail.order.device_id.as_deref(), Some("device-1"));
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].unit_price, 120.0);
    assert_eq!(detail.items[0].name, "Burger");
    assert!(detail.items[0].options.includes_option(SIZE));
}

#[tokio::test]
async fn total_is_sum_of_unit_price_times_quantity() {
    let h = harness().await;
    let dressing = json!([{
        "optionId": DRESSING,
        "values": [
            {"valueId": NO_DRESSING, "priceDelta": -5},
            {"valueId": EXTRA_DRESSING, "priceDelta": 2.5}
        ]
    }]);
    let created = h
        .service
        .create_order(request(vec![
            line(BURGER, 1, size(REGULAR, 0.0)),
            line(SALAD, 3, dressing),
            line(SALAD, 1, Value::Null),
        ]))
        .await
        .unwrap();

    let detail = h.service.get_order(created.order_id).await.unwrap();
    let expected: f64 = detail
        .items
        .iter()
        .map(|i| i.unit_price * i.quantity as f64)
        .sum();
    assert_eq!(created.total, expected);
    // 100 + (50 - 5 + 2.5) * 3 + 50
    assert_eq!(created.total, 292.5);
    assert_eq!(detail.items[1].unit_price, 47.5);
}

#[tokio::test]
async fn sub_cent_delta_keeps_total_equal_to_stored_lines() {
    let h = harness().await;
    let dressing = json!([{
        "optionId": DRESSING,
        "values": [{"valueId": EXTRA_DRESSING, "priceDelta": 0.005}]
    }]);
    let created = h
        .service
        .create_order(request(vec![
            line(SALAD, 10, dressing),
            line(BURGER, 3, size(LARGE, 0.333)),
        ]))
        .await
        .unwrap();

    let detail = h.service.get_order(created.order_id).await.unwrap();
    assert_eq!(detail.items[0].unit_price, 50.01);
    assert_eq!(detail.items[1].unit_price, 100.33);

    let from_lines = money::order_total(
        detail
            .items
            .iter()
            .map(|i| (money::to_decimal(i.unit_price), i.quantity)),
    );
    assert_eq!(created.total, money::to_f64(from_lines));
    assert_eq!(created.total, 801.09);
    assert_eq!(detail.order.total, created.total);
}

#[tokio::test]
async fn encoded_option_string_is_normalized() {
    let h = harness().await;
    let encoded = Value::String(size(LARGE, 20.0).to_string());
    let created = h
        .service
        .create_order(request(vec![line(BURGER, 1, encoded)]))
        .await
        .unwrap();
    assert_eq!(created.total, 120.0);

    let detail = h.service.get_order(created.order_id).await.unwrap();
    assert_eq!(detail.items[0].options.options()[0].option_id, SIZE);
}

#[tokio::test]
async fn submitted_delta_is_used_as_sent() {
    let h = harness().await;
    let created = h
        .service
        .create_order(request(vec![line(BURGER, 1, size(LARGE, 7.5))]))
        .await
        .unwrap();
    assert_eq!(created.total, 107.5);
}

#[tokio::test]
async fn negative_delta_is_not_clamped() {
    let h = harness().await;
    let big_discount = json!([{
        "optionId": DRESSING,
        "values": [{"valueId": NO_DRESSING, "priceDelta": -60}]
    }]);
    let created = h
        .service
        .create_order(request(vec![line(SALAD, 1, big_discount)]))
        .await
        .unwrap();
    assert_eq!(created.total, -10.0);
}

#[tokio::test]
async fn unknown_venue_is_not_found_and_writes_nothing() {
    let h = harness().await;
    let mut req = request(vec![line(BURGER, 1, size(REGULAR, 0.0))]);
    req.venue_id = 999;
    req.table_id = None;

    let err = app_error(h.service.create_order(req).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::VenueNotFound);
    assert!(err.is_not_found());
    assert_eq!(order_count(&h.db).await, 0);
}

#[tokio::test]
async fn unavailable_item_is_rejected_and_writes_nothing() {
    let h = harness().await;
    let err = app_error(
        h.service
            .create_order(request(vec![
                line(BURGER, 1, size(REGULAR, 0.0)),
                line(SOUP, 1, Value::Null),
            ]))
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::MenuItemUnavailable);
    assert!(err.is_validation());
    assert!(err.message.contains("Soup"));
    assert_eq!(order_count(&h.db).await, 0);
    assert_eq!(line_count(&h.db).await, 0);
}

#[tokio::test]
async fn missing_required_option_is_rejected_and_writes_nothing() {
    let h = harness().await;
    for options in [Value::Null, json!([]), json!([{"optionId": SIZE, "values": []}])] {
        let err = app_error(
            h.service
                .create_order(request(vec![
                    line(SALAD, 1, Value::Null),
                    line(BURGER, 1, options),
                ]))
                .await
                .unwrap_err(),
        );
        assert_eq!(err.code, ErrorCode::RequiredOptionMissing);
        assert!(err.message.contains("Size"));
        assert!(err.message.contains("Burger"));
    }
    assert_eq!(order_count(&h.db).await, 0);
    assert_eq!(line_count(&h.db).await, 0);
}

#[tokio::test]
async fn item_of_another_venue_is_not_found() {
    let h = harness().await;
    let err = app_error(
        h.service
            .create_order(request(vec![line(PASTA, 1, Value::Null)]))
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::MenuItemNotFound);

    let err = app_error(
        h.service
            .create_order(request(vec![line(424242, 1, Value::Null)]))
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::MenuItemNotFound);
    assert_eq!(order_count(&h.db).await, 0);
}

#[tokio::test]
async fn table_must_belong_to_the_venue() {
    let h = harness().await;
    let mut req = request(vec![line(SALAD, 1, Value::Null)]);
    req.table_id = Some(OTHER_TABLE);
    let err = app_error(h.service.create_order(req).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::TableNotFound);

    // Tableless (takeaway) orders are fine
    let mut req = request(vec![line(SALAD, 1, Value::Null)]);
    req.table_id = None;
    assert!(h.service.create_order(req).await.is_ok());
}

#[tokio::test]
async fn empty_order_and_bad_quantities_are_rejected() {
    let h = harness().await;
    let err = app_error(h.service.create_order(request(vec![])).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::OrderEmpty);

    let err = app_error(
        h.service
            .create_order(request(vec![line(SALAD, 0, Value::Null)]))
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::ValidationFailed);

    let mut req = request(vec![line(SALAD, 1, Value::Null)]);
    req.pax = Some(0);
    assert!(h.service.create_order(req).await.is_err());
    assert_eq!(order_count(&h.db).await, 0);
}

#[tokio::test]
async fn malformed_option_payload_is_rejected() {
    let h = harness().await;
    let err = app_error(
        h.service
            .create_order(request(vec![line(BURGER, 1, json!("{broken"))]))
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::InvalidOptionPayload);
    assert_eq!(order_count(&h.db).await, 0);
}

#[tokio::test]
async fn create_broadcasts_to_the_venue_and_pushes_staff() {
    let mut h = harness().await;
    let mut venue_rx = h.service.hub().subscribe(VENUE).unwrap();
    let mut other_rx = h.service.hub().subscribe(OTHER_VENUE).unwrap();

    let created = h
        .service
        .create_order(request(vec![line(BURGER, 1, size(REGULAR, 0.0))]))
        .await
        .unwrap();

    let event = venue_rx.recv().await.unwrap();
    assert_eq!(event.kind, LiveEventKind::OrderCreated);
    assert_eq!(event.venue_id, VENUE);
    assert_eq!(event.data.order_id, created.order_id);
    assert_eq!(event.data.status, OrderStatus::New);
    assert_eq!(event.data.device_id.as_deref(), Some("device-1"));

    let push = tokio::time::timeout(Duration::from_secs(1), h.pushes.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(push.order_id, created.order_id);
    assert_eq!(push.table_id, Some(TABLE));

    assert!(
        tokio::time::timeout(Duration::from_millis(50), other_rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn push_failure_does_not_fail_creation() {
    let mut h = harness_with(true).await;
    let created = h
        .service
        .create_order(request(vec![line(SALAD, 1, Value::Null)]))
        .await
        .unwrap();

    // The failing send still happened, and the order exists
    let push = tokio::time::timeout(Duration::from_secs(1), h.pushes.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(push.order_id, created.order_id);
    assert!(h.service.get_order(created.order_id).await.is_ok());
}

// ============================================================================
// Status transitions
// ============================================================================

async fn place(h: &Harness) -> i64 {
    h.service
        .create_order(request(vec![line(SALAD, 1, Value::Null)]))
        .await
        .unwrap()
        .order_id
}

#[tokio::test]
async fn forward_path_to_served() {
    let h = harness().await;
    let id = place(&h).await;

    for next in ["PREPARING", "READY", "SERVED"] {
        let updated = h.service.update_status(id, status(next)).await.unwrap();
        assert_eq!(updated.status.as_str(), next);
    }
    let order = h.service.get_order(id).await.unwrap().order;
    assert_eq!(order.status, OrderStatus::Served);

    // Nothing leaves SERVED
    for target in ["NEW", "PREPARING", "READY", "CANCELLED"] {
        let err = app_error(h.service.update_status(id, status(target)).await.unwrap_err());
        assert_eq!(err.code, ErrorCode::InvalidStatusTransition);
    }
}

#[tokio::test]
async fn skipping_and_backward_moves_are_rejected() {
    let h = harness().await;
    let id = place(&h).await;

    let err = app_error(h.service.update_status(id, status("READY")).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::InvalidStatusTransition);

    h.service.update_status(id, status("PREPARING")).await.unwrap();
    let err = app_error(h.service.update_status(id, status("NEW")).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::InvalidStatusTransition);
    assert_eq!(
        h.service.get_order(id).await.unwrap().order.status,
        OrderStatus::Preparing
    );
}

#[tokio::test]
async fn cancellation_window() {
    let h = harness().await;

    let from_new = place(&h).await;
    let mut req = status("CANCELLED");
    req.cancellation_reason = Some("  customer left  ".into());
    h.service.update_status(from_new, req).await.unwrap();
    let order = h.service.get_order(from_new).await.unwrap().order;
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.cancellation_reason.as_deref(), Some("customer left"));

    let from_preparing = place(&h).await;
    h.service
        .update_status(from_preparing, status("PREPARING"))
        .await
        .unwrap();
    h.service
        .update_status(from_preparing, status("CANCELLED"))
        .await
        .unwrap();

    // READY -> CANCELLED is closed
    let ready = place(&h).await;
    h.service.update_status(ready, status("PREPARING")).await.unwrap();
    h.service.update_status(ready, status("READY")).await.unwrap();
    let err = app_error(h.service.update_status(ready, status("CANCELLED")).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::InvalidStatusTransition);

    // CANCELLED -> PREPARING too
    let err = app_error(
        h.service
            .update_status(from_new, status("PREPARING"))
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::InvalidStatusTransition);
}

#[tokio::test]
async fn reason_is_ignored_outside_cancellation() {
    let h = harness().await;
    let id = place(&h).await;
    let mut req = status("PREPARING");
    req.cancellation_reason = Some("not a cancellation".into());
    h.service.update_status(id, req).await.unwrap();
    assert!(h
        .service
        .get_order(id)
        .await
        .unwrap()
        .order
        .cancellation_reason
        .is_none());
}

#[tokio::test]
async fn unknown_status_and_missing_order() {
    let h = harness().await;
    let id = place(&h).await;

    let err = app_error(h.service.update_status(id, status("DONE")).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    let err = app_error(h.service.update_status(id, status("preparing")).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::ValidationFailed);

    let err = app_error(h.service.update_status(777, status("PREPARING")).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::OrderNotFound);
}

#[tokio::test]
async fn each_status_change_emits_exactly_one_event() {
    let h = harness().await;
    let id = place(&h).await;
    let mut rx = h.service.hub().subscribe(VENUE).unwrap();

    h.service.update_status(id, status("PREPARING")).await.unwrap();
    // Rejected transition: no event
    let _ = h.service.update_status(id, status("SERVED")).await;
    h.service.update_status(id, status("READY")).await.unwrap();

    let first = rx.recv().await.unwrap();
    assert_eq!(first.kind, LiveEventKind::OrderStatusChanged);
    assert_eq!(first.venue_id, VENUE);
    assert_eq!(first.data.order_id, id);
    assert_eq!(first.data.status, OrderStatus::Preparing);

    let second = rx.recv().await.unwrap();
    assert_eq!(second.data.status, OrderStatus::Ready);

    assert!(
        tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .is_err()
    );
}

/// Lets both racing requests read the order before either writes
struct GatedOrderRepository {
    inner: crate::db::SqliteOrderRepository,
    barrier: Barrier,
}

#[async_trait]
impl OrderRepository for GatedOrderRepository {
    async fn save(&self, detail: &OrderDetail) -> crate::db::RepoResult<()> {
        self.inner.save(detail).await
    }

    async fn find_by_id(&self, order_id: i64) -> crate::db::RepoResult<Option<OrderDetail>> {
        let found = self.inner.find_by_id(order_id).await;
        self.barrier.wait().await;
        found
    }

    async fn find_by_venue(
        &self,
        venue_id: i64,
        filter: &OrderFilter,
    ) -> crate::db::RepoResult<Vec<OrderDetail>> {
        self.inner.find_by_venue(venue_id, filter).await
    }

    async fn update_status(
        &self,
        order_id: i64,
        status: OrderStatus,
        cancellation_reason: Option<&str>,
        updated_at: i64,
    ) -> crate::db::RepoResult<()> {
        self.inner
            .update_status(order_id, status, cancellation_reason, updated_at)
            .await
    }

    async fn update_staff_notes(
        &self,
        order_id: i64,
        staff_notes: Option<&str>,
        updated_at: i64,
    ) -> crate::db::RepoResult<()> {
        self.inner
            .update_staff_notes(order_id, staff_notes, updated_at)
            .await
    }

    async fn delete(&self, order_id: i64) -> crate::db::RepoResult<bool> {
        self.inner.delete(order_id).await
    }
}

#[tokio::test]
async fn concurrent_updates_race_last_write_wins() {
    let h = harness().await;
    let id = place(&h).await;

    let hub = VenueHub::new(10);
    let mut rx = hub.subscribe(VENUE).unwrap();
    let racing = OrderService::new(
        Arc::new(h.db.venues()),
        Arc::new(h.db.menu()),
        Arc::new(GatedOrderRepository {
            inner: h.db.orders(),
            barrier: Barrier::new(2),
        }),
        hub,
        Arc::new(crate::push::NoopPushNotifier),
    );

    let (prepare, cancel) = tokio::join!(
        racing.update_status(id, status("PREPARING")),
        racing.update_status(id, status("CANCELLED")),
    );
    // Both saw NEW, so both transitions were legal and both were written
    assert!(prepare.is_ok());
    assert!(cancel.is_ok());

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    let mut emitted = vec![first.data.status, second.data.status];
    emitted.sort_by_key(|s| s.as_str());
    assert_eq!(emitted, vec![OrderStatus::Cancelled, OrderStatus::Preparing]);

    // The stored status is the second write to land
    let stored = h.service.get_order(id).await.unwrap().order.status;
    assert_eq!(stored, second.data.status);
}

// ============================================================================
// Staff notes, reads, deletion
// ============================================================================

#[tokio::test]
async fn staff_notes_overwrite_without_broadcast() {
    let h = harness().await;
    let id = place(&h).await;
    let mut rx = h.service.hub().subscribe(VENUE).unwrap();

    let updated = h
        .service
        .update_staff_notes(id, Some("allergy: nuts".into()))
        .await
        .unwrap();
    assert_eq!(updated.staff_notes.as_deref(), Some("allergy: nuts"));

    let updated = h
        .service
        .update_staff_notes(id, Some("VIP".into()))
        .await
        .unwrap();
    let order = h.service.get_order(id).await.unwrap().order;
    assert_eq!(order.staff_notes.as_deref(), Some("VIP"));
    assert_eq!(order.updated_at, updated.updated_at);
    // Staff notes never change the status
    assert_eq!(order.status, OrderStatus::New);

    assert!(
        tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .is_err()
    );

    let err = app_error(
        h.service
            .update_staff_notes(999, Some("x".into()))
            .await
            .unwrap_err(),
    );
    assert_eq!(err.code, ErrorCode::OrderNotFound);

    let too_long = "x".repeat(MAX_NOTE_LEN + 1);
    let err = app_error(h.service.update_staff_notes(id, Some(too_long)).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::ValueOutOfRange);
}

#[tokio::test]
async fn list_orders_by_status_and_device() {
    let h = harness().await;
    let a = place(&h).await;
    let b = place(&h).await;
    h.service.update_status(b, status("PREPARING")).await.unwrap();
    h.service.update_status(b, status("CANCELLED")).await.unwrap();

    let active = h
        .service
        .list_orders(
            VENUE,
            OrderListQuery {
                active: Some(true),
                device_id: Some("device-1".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].order.id, a);

    let cancelled = h
        .service
        .list_orders(
            VENUE,
            OrderListQuery {
                status: Some("CANCELLED".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].order.id, b);

    let err = app_error(
        h.service
            .list_orders(
                VENUE,
                OrderListQuery {
                    status: Some("LOST".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err(),
    );
    assert!(err.is_validation());
}

#[tokio::test]
async fn delete_is_administrative() {
    let h = harness().await;
    let id = place(&h).await;

    h.service.delete_order(id).await.unwrap();
    let err = app_error(h.service.get_order(id).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::OrderNotFound);
    let err = app_error(h.service.delete_order(id).await.unwrap_err());
    assert_eq!(err.code, ErrorCode::OrderNotFound);
}
