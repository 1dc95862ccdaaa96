//! Integration tests for the reconciliation engine, running against an in-memory SQLite store.
use anyhow::Result;
use chrono::{TimeZone, Utc};
use school_payment_engine::{
    db_types::{
        CollectId,
        EventSource,
        NewOrder,
        OrderId,
        PaymentStatus,
        StatusEvent,
        StatusUpdate,
        StudentInfo,
    },
    helpers::new_order_id,
    traits::ReconciliationDatabase,
    PollResult,
    ReconciliationApi,
    ReconciliationError,
    SqliteDatabase,
    TransactionQueryFilter,
};
use sps_common::Money;

async fn new_api() -> ReconciliationApi<SqliteDatabase> {
    let _ = env_logger::try_init();
    let db = SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("could not open in-memory database");
    ReconciliationApi::new(db)
}

fn sample_order(order_id: OrderId) -> NewOrder {
    let student = StudentInfo {
        name: "Asha Rao".to_string(),
        id: "STU-042".to_string(),
        email: "asha@example.com".to_string(),
    };
    NewOrder::new(order_id, "school-1".to_string(), "trustee-1".to_string(), student)
}

fn webhook_event(token: &str, status: &str, update: StatusUpdate) -> StatusEvent {
    StatusEvent {
        source: EventSource::WebhookPost,
        order_token: Some(token.to_string()),
        reported_status: Some(status.to_string()),
        raw_payload: serde_json::json!({ "order_id": token, "status": status }),
        update,
    }
}

#[tokio::test]
async fn create_order_starts_pending_and_attaches_collect_id() -> Result<()> {
    let api = new_api().await;
    let order_id = new_order_id();
    let (order, record) = api.register_order(sample_order(order_id.clone()), Money::from_rupees(500.0)?).await?;
    assert_eq!(record.status, PaymentStatus::Pending);
    assert_eq!(record.order_amount, Money::from_paisa(50_000));
    assert_eq!(record.payment_message, "Payment initiated");
    assert!(order.collect_id.is_none());

    let order = api
        .record_gateway_acceptance(
            &order_id,
            CollectId::from("abc"),
            Some("signed".to_string()),
            Some("https://pay/abc".to_string()),
        )
        .await?;
    assert_eq!(order.collect_id, Some(CollectId::from("abc")));
    assert_eq!(order.payment_url.as_deref(), Some("https://pay/abc"));

    let snapshot = api.status_snapshot(&order_id).await?;
    assert_eq!(snapshot.status(), PaymentStatus::Pending);
    let record = snapshot.record.expect("status record should exist");
    assert_eq!(record.payment_message, "Payment link generated successfully");
    Ok(())
}

#[tokio::test]
async fn collect_id_is_set_once() -> Result<()> {
    let api = new_api().await;
    let order_id = new_order_id();
    api.register_order(sample_order(order_id.clone()), Money::from_paisa(100)).await?;
    api.record_gateway_acceptance(&order_id, CollectId::from("abc"), None, None).await?;
    // Same collect id again is a no-op.
    let order = api.record_gateway_acceptance(&order_id, CollectId::from("abc"), None, None).await?;
    assert_eq!(order.collect_id, Some(CollectId::from("abc")));
    // A different collect id is refused.
    let err = api.record_gateway_acceptance(&order_id, CollectId::from("xyz"), None, None).await.unwrap_err();
    assert!(matches!(err, ReconciliationError::StoreError(_)));
    Ok(())
}

#[tokio::test]
async fn processing_poll_result_maps_to_pending() -> Result<()> {
    let api = new_api().await;
    let order_id = new_order_id();
    api.register_order(sample_order(order_id.clone()), Money::from_paisa(50_000)).await?;
    let poll = PollResult {
        status: Some("PROCESSING".to_string()),
        amount: Some(Money::from_paisa(50_000)),
        raw: serde_json::json!({ "status": "PROCESSING", "amount": 500 }),
    };
    let (_, record) = api.apply_poll_result(&order_id, poll).await?;
    assert_eq!(record.status, PaymentStatus::Pending);
    assert_eq!(record.gateway_status.as_deref(), Some("PROCESSING"));
    assert!(record.last_status_check.is_some());
    assert!(record.payment_time.is_none());
    assert!(record.gateway_response.as_deref().unwrap_or("").contains("PROCESSING"));
    Ok(())
}

#[tokio::test]
async fn successful_poll_sets_payment_time() -> Result<()> {
    let api = new_api().await;
    let order_id = new_order_id();
    api.register_order(sample_order(order_id.clone()), Money::from_paisa(50_000)).await?;
    let poll = PollResult {
        status: Some("SUCCESS".to_string()),
        amount: Some(Money::from_paisa(49_900)),
        raw: serde_json::json!({ "status": "SUCCESS", "amount": 499 }),
    };
    let (_, record) = api.apply_poll_result(&order_id, poll).await?;
    assert_eq!(record.status, PaymentStatus::Success);
    assert_eq!(record.transaction_amount, Money::from_paisa(49_900));
    assert!(record.payment_time.is_some());
    Ok(())
}

#[tokio::test]
async fn get_callback_marks_success_and_audits() -> Result<()> {
    let api = new_api().await;
    let order_id = new_order_id();
    api.register_order(sample_order(order_id.clone()), Money::from_paisa(50_000)).await?;
    api.record_gateway_acceptance(&order_id, CollectId::from("abc"), None, None).await?;

    let now = Utc::now();
    let event = StatusEvent {
        source: EventSource::CallbackGet,
        order_token: Some("abc".to_string()),
        reported_status: Some("SUCCESS".to_string()),
        raw_payload: serde_json::json!({ "EdvironCollectRequestId": "abc", "status": "SUCCESS" }),
        update: StatusUpdate::at(now)
            .with_payment_time(now)
            .with_payment_message("Updated via GET callback with status: SUCCESS"),
    };
    let outcome = api.ingest_event(event).await?;
    assert_eq!(outcome.order.order_id, order_id);
    assert_eq!(outcome.record.status, PaymentStatus::Success);
    assert!(outcome.record.payment_time.is_some());

    let log = api.db().fetch_webhook_log(outcome.log_id).await?.expect("audit entry should exist");
    assert!(log.processed);
    assert!(log.processing_error.is_none());
    Ok(())
}

#[tokio::test]
async fn status_updates_merge_rather_than_replace() -> Result<()> {
    let api = new_api().await;
    let order_id = new_order_id();
    let (order, _) = api.register_order(sample_order(order_id.clone()), Money::from_paisa(100)).await?;

    let t1 = Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2024, 9, 1, 10, 5, 0).unwrap();
    api.db().upsert_status(order.id, StatusUpdate::at(t1).with_bank_reference("R1")).await?;
    let record =
        api.db().upsert_status(order.id, StatusUpdate::at(t2).with_status(PaymentStatus::Success)).await?;
    assert_eq!(record.status, PaymentStatus::Success);
    assert_eq!(record.bank_reference, "R1");
    // Fields never mentioned keep their creation defaults.
    assert_eq!(record.error_message, "NA");
    assert_eq!(record.order_amount, Money::from_paisa(100));
    Ok(())
}

#[tokio::test]
async fn stale_events_are_ignored() -> Result<()> {
    let api = new_api().await;
    let order_id = new_order_id();
    let (order, _) = api.register_order(sample_order(order_id.clone()), Money::from_paisa(100)).await?;

    let newer = Utc::now() + chrono::Duration::minutes(5);
    let older = Utc::now() - chrono::Duration::minutes(5);
    api.db()
        .upsert_status(order.id, StatusUpdate::at(newer).with_status(PaymentStatus::Success))
        .await?;
    let record = api
        .db()
        .upsert_status(
            order.id,
            StatusUpdate::at(older).with_status(PaymentStatus::Failed).with_error_message("late failure"),
        )
        .await?;
    assert_eq!(record.status, PaymentStatus::Success);
    assert_eq!(record.error_message, "NA");
    assert_eq!(record.last_event_time, newer);
    Ok(())
}

#[tokio::test]
async fn replayed_webhooks_are_idempotent_but_audited_twice() -> Result<()> {
    let api = new_api().await;
    let order_id = new_order_id();
    api.register_order(sample_order(order_id.clone()), Money::from_paisa(50_000)).await?;

    let paid_at = Utc.with_ymd_and_hms(2024, 9, 2, 12, 0, 0).unwrap();
    let update = StatusUpdate::at(paid_at)
        .with_transaction_amount(Money::from_paisa(50_000))
        .with_payment_mode("upi")
        .with_bank_reference("HDFC001")
        .with_payment_time(paid_at);
    let event = webhook_event(order_id.as_str(), "SUCCESS", update);

    let first = api.ingest_event(event.clone()).await?;
    let second = api.ingest_event(event).await?;
    assert_ne!(first.log_id, second.log_id);
    assert_eq!(first.record.status, second.record.status);
    assert_eq!(first.record.transaction_amount, second.record.transaction_amount);
    assert_eq!(first.record.bank_reference, second.record.bank_reference);
    assert_eq!(first.record.payment_time, second.record.payment_time);
    assert_eq!(first.record.last_event_time, second.record.last_event_time);
    Ok(())
}

#[tokio::test]
async fn internal_id_match_takes_precedence_over_collect_id() -> Result<()> {
    let api = new_api().await;
    // Order A's internal id collides with the collect id attached to order B.
    let (order_a, _) = api.register_order(sample_order(OrderId::from("shared-token")), Money::from_paisa(100)).await?;
    let order_b_id = new_order_id();
    api.register_order(sample_order(order_b_id.clone()), Money::from_paisa(200)).await?;
    api.record_gateway_acceptance(&order_b_id, CollectId::from("shared-token"), None, None).await?;

    let resolved = api.db().resolve_order("shared-token").await?.expect("token should resolve");
    assert_eq!(resolved.id, order_a.id);
    Ok(())
}

#[tokio::test]
async fn unknown_order_is_audited_and_reported() -> Result<()> {
    let api = new_api().await;
    let event = webhook_event("ORD_missing", "SUCCESS", StatusUpdate::at(Utc::now()));
    let err = api.ingest_event(event).await.unwrap_err();
    assert!(matches!(err, ReconciliationError::OrderNotFound(_)));

    // Exactly one audit entry, annotated, and no status record was created anywhere.
    let log = api.db().fetch_webhook_log(1).await?.expect("audit entry should exist");
    assert!(!log.processed);
    assert_eq!(log.processing_error.as_deref(), Some("Order not found"));
    assert!(api.db().fetch_webhook_log(2).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn events_without_an_order_token_are_rejected_but_audited() -> Result<()> {
    let api = new_api().await;
    let event = StatusEvent {
        source: EventSource::WebhookPost,
        order_token: None,
        reported_status: Some("SUCCESS".to_string()),
        raw_payload: serde_json::json!({ "status": "SUCCESS" }),
        update: StatusUpdate::at(Utc::now()),
    };
    let err = api.ingest_event(event).await.unwrap_err();
    assert!(matches!(err, ReconciliationError::InvalidEvent(_)));
    let log = api.db().fetch_webhook_log(1).await?.expect("audit entry should exist");
    assert!(!log.processed);
    assert_eq!(log.processing_error.as_deref(), Some("missing order reference in payload"));
    Ok(())
}

#[tokio::test]
async fn missing_status_record_reads_as_implicit_pending() -> Result<()> {
    let api = new_api().await;
    let order_id = new_order_id();
    let (order, _) = api.register_order(sample_order(order_id.clone()), Money::from_paisa(100)).await?;
    // Simulate a crash between the order write and the status write.
    sqlx::query("DELETE FROM order_statuses WHERE order_pk = $1").bind(order.id).execute(api.db().pool()).await?;

    let snapshot = api.status_snapshot(&order_id).await?;
    assert!(snapshot.record.is_none());
    assert_eq!(snapshot.status(), PaymentStatus::Pending);

    // The next event recreates the record.
    let record = api
        .db()
        .upsert_status(order.id, StatusUpdate::at(Utc::now()).with_status(PaymentStatus::Success))
        .await?;
    assert_eq!(record.status, PaymentStatus::Success);
    assert_eq!(record.error_message, "NA");
    Ok(())
}

#[tokio::test]
async fn transaction_listing_filters_and_paginates() -> Result<()> {
    let api = new_api().await;
    for i in 0..3i64 {
        let mut order = sample_order(new_order_id());
        if i == 2 {
            order.school_id = "school-2".to_string();
        }
        let (saved, _) = api.register_order(order, Money::from_paisa(1_000 * (i + 1))).await?;
        if i == 0 {
            api.db()
                .upsert_status(saved.id, StatusUpdate::at(Utc::now()).with_status(PaymentStatus::Success))
                .await?;
        }
    }

    let page = api.list_transactions(TransactionQueryFilter::default()).await?;
    assert_eq!(page.total, 3);
    assert_eq!(page.transactions.len(), 3);

    let successes =
        api.list_transactions(TransactionQueryFilter::default().with_status(PaymentStatus::Success)).await?;
    assert_eq!(successes.total, 1);
    assert_eq!(successes.transactions[0].status, PaymentStatus::Success);

    let school_two =
        api.list_transactions(TransactionQueryFilter::default().with_school_id("school-2")).await?;
    assert_eq!(school_two.total, 1);
    assert_eq!(school_two.transactions[0].school_id, "school-2");

    let paged = api.list_transactions(TransactionQueryFilter::default().with_page(2).with_limit(2)).await?;
    assert_eq!(paged.transactions.len(), 1);
    assert_eq!(paged.total, 3);
    assert_eq!(paged.total_pages(), 2);
    assert!(!paged.has_next());
    assert!(paged.has_prev());
    Ok(())
}
