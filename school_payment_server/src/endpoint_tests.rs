//! In-process endpoint tests running against an in-memory database.
//!
//! The gateway-facing routes (payment creation, status polling) need a live gateway and are
//! exercised in the engine and integration unit tests instead; everything here sticks to the
//! routes the gateway calls *us* on, plus the local queries.
use actix_web::{
    dev::{Service, ServiceResponse},
    test,
    web,
    App,
    Error,
};
use school_payment_engine::{
    db_types::{CollectId, NewOrder, OrderId, StudentInfo},
    helpers::new_order_id,
    traits::ReconciliationDatabase,
    ReconciliationApi,
    SqliteDatabase,
};
use serde_json::{json, Value};
use sps_common::Money;

use crate::routes::{health, payment_callback, transaction_status, transactions, webhook};

async fn new_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    SqliteDatabase::new_with_url("sqlite::memory:", 1).await.expect("could not open in-memory database")
}

async fn test_app(
    db: &SqliteDatabase,
) -> impl Service<actix_http::Request, Response = ServiceResponse, Error = Error> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(ReconciliationApi::new(db.clone())))
            .service(health)
            .service(
                web::scope("/api")
                    .route("/webhook", web::post().to(webhook::<SqliteDatabase>))
                    .route("/payment-callback", web::get().to(payment_callback::<SqliteDatabase>))
                    .route("/transaction-status/{order_id}", web::get().to(transaction_status::<SqliteDatabase>))
                    .route("/transactions", web::get().to(transactions::<SqliteDatabase>)),
            ),
    )
    .await
}

async fn seed_order(db: &SqliteDatabase, amount: Money) -> OrderId {
    let api = ReconciliationApi::new(db.clone());
    let order_id = new_order_id();
    let student = StudentInfo {
        name: "Asha Rao".to_string(),
        id: "STU-042".to_string(),
        email: "asha@example.com".to_string(),
    };
    let order = NewOrder::new(order_id.clone(), "school-1".to_string(), "trustee-1".to_string(), student);
    api.register_order(order, amount).await.expect("could not seed order");
    order_id
}

#[actix_web::test]
async fn health_check() {
    let db = new_db().await;
    let app = test_app(&db).await;
    let req = test::TestRequest::get().uri("/health").to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
    let body = test::read_body(res).await;
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn webhook_applies_a_rich_payload() {
    let db = new_db().await;
    let app = test_app(&db).await;
    let order_id = seed_order(&db, Money::from_paisa(200_000)).await;

    let payload = json!({
        "status": 200,
        "order_info": {
            "order_id": order_id,
            "order_amount": 2000,
            "transaction_amount": 2200,
            "gateway": "PhonePe",
            "bank_reference": "YESBNK222",
            "status": "success",
            "payment_mode": "upi",
            "payemnt_details": "success@ybl",
            "Payment_message": "payment success",
            "payment_time": "2025-04-23T08:14:21.945Z",
            "error_message": "NA"
        }
    });
    let req = test::TestRequest::post().uri("/api/webhook").set_json(&payload).to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["status"], json!("success"));

    let req = test::TestRequest::get().uri(&format!("/api/transaction-status/{order_id}")).to_request();
    let res = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["transaction_amount"], json!(2200));
    assert_eq!(body["payment_mode"], json!("upi"));

    let log = db.fetch_webhook_log(1).await.unwrap().expect("audit entry should exist");
    assert!(log.processed);
    assert!(log.processing_error.is_none());
}

#[actix_web::test]
async fn webhook_for_an_unknown_order_is_refused_but_audited() {
    let db = new_db().await;
    let app = test_app(&db).await;
    let payload = json!({
        "status": 200,
        "order_info": { "order_id": "ORD_missing", "status": "success" }
    });
    let req = test::TestRequest::post().uri("/api/webhook").set_json(&payload).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 404);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["success"], json!(false));

    let log = db.fetch_webhook_log(1).await.unwrap().expect("audit entry should exist");
    assert!(!log.processed);
    assert_eq!(log.processing_error.as_deref(), Some("Order not found"));
}

#[actix_web::test]
async fn malformed_webhook_bodies_are_still_audited() {
    let db = new_db().await;
    let app = test_app(&db).await;
    let req = test::TestRequest::post().uri("/api/webhook").set_payload("this is not json").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 400);

    let log = db.fetch_webhook_log(1).await.unwrap().expect("audit entry should exist");
    assert!(!log.processed);
    assert!(log.payload.contains("this is not json"));
}

#[actix_web::test]
async fn get_callback_resolves_via_collect_id() {
    let db = new_db().await;
    let app = test_app(&db).await;
    let order_id = seed_order(&db, Money::from_paisa(50_000)).await;
    let api = ReconciliationApi::new(db.clone());
    api.record_gateway_acceptance(&order_id, CollectId::from("6808bc4888e4e3c149e757f1"), None, None)
        .await
        .unwrap();

    let req = test::TestRequest::get()
        .uri("/api/payment-callback?EdvironCollectRequestId=6808bc4888e4e3c149e757f1&status=SUCCESS")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["custom_order_id"], json!(order_id));
    assert_eq!(body["status"], json!("success"));

    let snapshot = api.status_snapshot(&order_id).await.unwrap();
    let record = snapshot.record.expect("status record should exist");
    assert!(record.payment_time.is_some());
    assert_eq!(record.gateway_status.as_deref(), Some("SUCCESS"));
}

#[actix_web::test]
async fn delayed_rich_webhook_still_merges_after_a_sparse_callback() {
    let db = new_db().await;
    let app = test_app(&db).await;
    let order_id = seed_order(&db, Money::from_paisa(50_000)).await;
    let api = ReconciliationApi::new(db.clone());
    api.record_gateway_acceptance(&order_id, CollectId::from("abc123"), None, None).await.unwrap();

    // The payer is redirected back right away; the webhook delivery lags behind.
    let req = test::TestRequest::get()
        .uri("/api/payment-callback?EdvironCollectRequestId=abc123&status=SUCCESS")
        .to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());

    let paid_at = chrono::Utc::now() - chrono::Duration::seconds(60);
    let payload = json!({
        "status": 200,
        "order_info": {
            "order_id": order_id,
            "status": "SUCCESS",
            "transaction_amount": 499,
            "payment_mode": "upi",
            "bank_reference": "YESBNK222",
            "payment_time": paid_at.to_rfc3339(),
        }
    });
    let req = test::TestRequest::post().uri("/api/webhook").set_json(&payload).to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());

    let snapshot = api.status_snapshot(&order_id).await.unwrap();
    let record = snapshot.record.expect("status record should exist");
    assert_eq!(record.bank_reference, "YESBNK222");
    assert_eq!(record.payment_mode, "upi");
    assert_eq!(record.transaction_amount, Money::from_paisa(49_900));
    assert_eq!(record.payment_time.unwrap().timestamp(), paid_at.timestamp());
}

#[actix_web::test]
async fn transaction_status_for_an_unknown_order_is_404() {
    let db = new_db().await;
    let app = test_app(&db).await;
    let req = test::TestRequest::get().uri("/api/transaction-status/ORD_nope").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 404);
}

#[actix_web::test]
async fn transaction_listing_filters_by_status() {
    let db = new_db().await;
    let app = test_app(&db).await;
    let paid = seed_order(&db, Money::from_paisa(100_000)).await;
    let _unpaid = seed_order(&db, Money::from_paisa(200_000)).await;

    let payload = json!({ "order_info": { "order_id": paid, "status": "SUCCESS" } });
    let req = test::TestRequest::post().uri("/api/webhook").set_json(&payload).to_request();
    test::call_service(&app, req).await;

    let req = test::TestRequest::get().uri("/api/transactions?status=success").to_request();
    let res = test::call_service(&app, req).await;
    assert!(res.status().is_success());
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["transactions"][0]["custom_order_id"], json!(paid));

    let req = test::TestRequest::get().uri("/api/transactions?status=paid-in-full").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status().as_u16(), 400);
}
