//! Request handlers for the payment API.
//!
//! Handlers are generic over the storage backend and do as little as possible themselves: they
//! translate wire formats into engine types, call the reconciliation API and render the result.
//! All status interpretation lives in the engine.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use school_payment_engine::{
    db_types::{NewOrder, OrderId},
    helpers::new_order_id,
    traits::ReconciliationDatabase,
    ReconciliationApi,
    TransactionQueryFilter,
};
use serde_json::{json, Value};

use crate::{
    config::GatewayConfig,
    data_objects::{CallbackParams, CreatePaymentRequest, TransactionParams, WebhookPayload},
    errors::ServerError,
    integrations::{EdvironApi, EdvironApiError},
};

/// Route handler for the health check endpoint
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

/// Creates a new payment: the order is registered locally first, then handed to the gateway.
///
/// A transport failure at the gateway leaves the order pending, so a later status poll can still
/// pick it up. Only a malformed 2xx response marks the order as failed, since in that case nothing
/// can ever reference it again.
pub async fn create_payment<B: ReconciliationDatabase>(
    api: web::Data<ReconciliationApi<B>>,
    gateway: web::Data<EdvironApi>,
    config: web::Data<GatewayConfig>,
    body: web::Json<CreatePaymentRequest>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    if !req.amount.is_positive() {
        return Err(ServerError::InvalidRequestBody("amount must be a positive rupee amount".to_string()));
    }
    let school_id = req.school_id.unwrap_or_else(|| config.school_id.clone());
    let trustee_id = req.trustee_id.unwrap_or_else(|| config.trustee_id.clone());
    let order_id = new_order_id();
    let new_order = NewOrder::new(order_id.clone(), school_id, trustee_id, req.student_info);
    api.register_order(new_order, req.amount).await?;
    match gateway.create_collect_request(req.amount).await {
        Ok(accepted) => {
            let order = api
                .record_gateway_acceptance(
                    &order_id,
                    accepted.collect_id.clone(),
                    accepted.sign,
                    Some(accepted.payment_url.clone()),
                )
                .await?;
            info!("💻️ Order {} is live at the gateway as collect request {}", order.order_id, accepted.collect_id);
            Ok(HttpResponse::Created().json(json!({
                "success": true,
                "custom_order_id": order.order_id,
                "collect_request_id": accepted.collect_id,
                "collect_request_url": accepted.payment_url,
            })))
        },
        Err(e @ EdvironApiError::InvalidResponse(_)) => {
            api.record_gateway_failure(&order_id, &e.to_string()).await?;
            Err(e.into())
        },
        Err(e) => {
            warn!("💻️ Gateway unreachable while creating order {order_id}. The order stays pending. {e}");
            Err(e.into())
        },
    }
}

/// Ingests the gateway's POST webhook. The raw body is audited even when it is not valid JSON.
pub async fn webhook<B: ReconciliationDatabase>(
    api: web::Data<ReconciliationApi<B>>,
    body: web::Bytes,
) -> Result<HttpResponse, ServerError> {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => Value::String(String::from_utf8_lossy(&body).into_owned()),
    };
    let payload = serde_json::from_value::<WebhookPayload>(raw.clone())
        .unwrap_or(WebhookPayload { status: None, order_info: None });
    let outcome = api.ingest_event(payload.into_event(raw)).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "custom_order_id": outcome.order.order_id,
        "status": outcome.record.status,
    })))
}

/// Ingests the sparse GET redirect the gateway issues when the payer returns from the payment
/// page.
pub async fn payment_callback<B: ReconciliationDatabase>(
    api: web::Data<ReconciliationApi<B>>,
    query: web::Query<CallbackParams>,
) -> Result<HttpResponse, ServerError> {
    let outcome = api.ingest_event(query.into_inner().into_event()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "custom_order_id": outcome.order.order_id,
        "status": outcome.record.status,
    })))
}

/// The order's current status as the backend knows it. No gateway round trip is made.
pub async fn transaction_status<B: ReconciliationDatabase>(
    api: web::Data<ReconciliationApi<B>>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let snapshot = api.status_snapshot(&order_id).await?;
    let record = snapshot.record.as_ref();
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "custom_order_id": snapshot.order.order_id,
        "collect_request_id": snapshot.order.collect_id,
        "status": snapshot.status(),
        "order_amount": record.map(|r| r.order_amount),
        "transaction_amount": record.map(|r| r.transaction_amount),
        "payment_mode": record.map(|r| r.payment_mode.clone()),
        "payment_time": record.and_then(|r| r.payment_time),
        "message": record.map(|r| r.payment_message.clone()),
    })))
}

/// Polls the gateway for the order's status and folds the answer into the local record.
pub async fn check_gateway_status<B: ReconciliationDatabase>(
    api: web::Data<ReconciliationApi<B>>,
    gateway: web::Data<EdvironApi>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    let snapshot = api.status_snapshot(&order_id).await?;
    let collect_id = snapshot.order.collect_id.clone().ok_or_else(|| {
        ServerError::OrderStateError(format!("Order {order_id} has not been registered with the gateway yet"))
    })?;
    let poll = gateway.check_collect_status(&collect_id).await?;
    let (order, record) = api.apply_poll_result(&order_id, poll).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "custom_order_id": order.order_id,
        "status": record.status,
        "gateway_status": record.gateway_status,
        "transaction_amount": record.transaction_amount,
    })))
}

/// The paginated transaction listing, optionally filtered by school and status.
pub async fn transactions<B: ReconciliationDatabase>(
    api: web::Data<ReconciliationApi<B>>,
    query: web::Query<TransactionParams>,
) -> Result<HttpResponse, ServerError> {
    let filter = build_filter(query.into_inner())?;
    render_transaction_page(api, filter).await
}

/// The transaction listing for a single school.
pub async fn transactions_by_school<B: ReconciliationDatabase>(
    api: web::Data<ReconciliationApi<B>>,
    path: web::Path<String>,
    query: web::Query<TransactionParams>,
) -> Result<HttpResponse, ServerError> {
    let school_id = path.into_inner();
    let filter = build_filter(query.into_inner())?.with_school_id(school_id);
    render_transaction_page(api, filter).await
}

fn build_filter(params: TransactionParams) -> Result<TransactionQueryFilter, ServerError> {
    let mut filter = TransactionQueryFilter::default();
    if let Some(page) = params.page {
        filter = filter.with_page(page);
    }
    if let Some(limit) = params.limit {
        filter = filter.with_limit(limit);
    }
    if let Some(school_id) = params.school_id {
        filter = filter.with_school_id(school_id);
    }
    if let Some(status) = params.status {
        let status = status
            .parse()
            .map_err(|_| ServerError::InvalidRequestBody(format!("{status} is not a valid payment status")))?;
        filter = filter.with_status(status);
    }
    Ok(filter)
}

async fn render_transaction_page<B: ReconciliationDatabase>(
    api: web::Data<ReconciliationApi<B>>,
    filter: TransactionQueryFilter,
) -> Result<HttpResponse, ServerError> {
    let page = api.list_transactions(filter).await?;
    trace!("💻️ Transaction listing page {} of {} rendered", page.page, page.total_pages());
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "total": page.total,
        "page": page.page,
        "limit": page.limit,
        "total_pages": page.total_pages(),
        "transactions": page.transactions,
    })))
}
