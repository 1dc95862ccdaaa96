use chrono::{DateTime, Utc};
use log::{debug, trace};
use sps_common::Money;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{PaymentStatus, StatusRecord, StatusUpdate};

/// Writes the initial `pending` status record for a freshly created order. Both amounts start at
/// the requested amount; the settled amount diverges later if the gateway reports otherwise.
///
/// `last_event_time` starts at the epoch, not at the insertion time, so the first event always
/// applies regardless of when it arrives.
pub async fn insert_initial_status(
    order_pk: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        r#"
            INSERT INTO order_statuses (
                order_pk,
                order_amount,
                transaction_amount,
                payment_message,
                last_event_time,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, 'Payment initiated', $4, $5, $6);
        "#,
    )
    .bind(order_pk)
    .bind(amount)
    .bind(amount)
    .bind(DateTime::<Utc>::default())
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_status_for_order(
    order_pk: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<StatusRecord>, sqlx::Error> {
    sqlx::query_as::<_, StatusRecord>("SELECT * FROM order_statuses WHERE order_pk = $1")
        .bind(order_pk)
        .fetch_optional(conn)
        .await
}

/// Creates a status record from an update alone. This is the recovery path for an order whose
/// initial status record is missing: unmentioned fields take their implicit-pending defaults.
pub async fn insert_status_from_update(
    order_pk: i64,
    update: &StatusUpdate,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    debug!("🗃️ No status record for order pk {order_pk}. Creating one from the update.");
    let now = Utc::now();
    sqlx::query(
        r#"
            INSERT INTO order_statuses (
                order_pk,
                order_amount,
                transaction_amount,
                payment_mode,
                payment_details,
                bank_reference,
                payment_message,
                status,
                error_message,
                payment_time,
                gateway_status,
                gateway_response,
                last_status_check,
                last_event_time,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16);
        "#,
    )
    .bind(order_pk)
    .bind(update.order_amount.unwrap_or_else(Money::zero))
    .bind(update.transaction_amount.unwrap_or_else(Money::zero))
    .bind(update.payment_mode.as_deref().unwrap_or("pending"))
    .bind(update.payment_details.as_deref().unwrap_or(""))
    .bind(update.bank_reference.as_deref().unwrap_or(""))
    .bind(update.payment_message.as_deref().unwrap_or(""))
    .bind(update.status.unwrap_or(PaymentStatus::Pending))
    .bind(update.error_message.as_deref().unwrap_or("NA"))
    .bind(update.payment_time)
    .bind(update.gateway_status.as_deref())
    .bind(update.gateway_response.as_deref())
    .bind(update.last_status_check)
    .bind(update.event_time)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Merges the provided fields into an existing status record. Fields the update does not mention
/// are left untouched.
pub async fn apply_status_update(
    order_pk: i64,
    update: &StatusUpdate,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE order_statuses SET ");
    let mut set_clause = builder.separated(", ");
    if let Some(status) = update.status {
        set_clause.push("status = ");
        set_clause.push_bind_unseparated(status);
    }
    if let Some(amount) = update.order_amount {
        set_clause.push("order_amount = ");
        set_clause.push_bind_unseparated(amount);
    }
    if let Some(amount) = update.transaction_amount {
        set_clause.push("transaction_amount = ");
        set_clause.push_bind_unseparated(amount);
    }
    if let Some(mode) = update.payment_mode.as_deref() {
        set_clause.push("payment_mode = ");
        set_clause.push_bind_unseparated(mode.to_string());
    }
    if let Some(details) = update.payment_details.as_deref() {
        set_clause.push("payment_details = ");
        set_clause.push_bind_unseparated(details.to_string());
    }
    if let Some(bank_reference) = update.bank_reference.as_deref() {
        set_clause.push("bank_reference = ");
        set_clause.push_bind_unseparated(bank_reference.to_string());
    }
    if let Some(message) = update.payment_message.as_deref() {
        set_clause.push("payment_message = ");
        set_clause.push_bind_unseparated(message.to_string());
    }
    if let Some(error) = update.error_message.as_deref() {
        set_clause.push("error_message = ");
        set_clause.push_bind_unseparated(error.to_string());
    }
    if let Some(time) = update.payment_time {
        set_clause.push("payment_time = ");
        set_clause.push_bind_unseparated(time);
    }
    if let Some(status) = update.gateway_status.as_deref() {
        set_clause.push("gateway_status = ");
        set_clause.push_bind_unseparated(status.to_string());
    }
    if let Some(response) = update.gateway_response.as_deref() {
        set_clause.push("gateway_response = ");
        set_clause.push_bind_unseparated(response.to_string());
    }
    if let Some(time) = update.last_status_check {
        set_clause.push("last_status_check = ");
        set_clause.push_bind_unseparated(time);
    }
    set_clause.push("last_event_time = ");
    set_clause.push_bind_unseparated(update.event_time);
    set_clause.push("updated_at = ");
    set_clause.push_bind_unseparated(Utc::now());
    builder.push(" WHERE order_pk = ");
    builder.push_bind(order_pk);
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build().execute(conn).await?;
    Ok(())
}
