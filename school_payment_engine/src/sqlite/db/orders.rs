use chrono::Utc;
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{CollectId, NewOrder, Order, OrderId};

/// Inserts a new order using the given connection. Not atomic on its own; embed the call in a
/// transaction and pass `&mut *tx` when the initial status record must be written alongside it.
pub async fn insert_order(order: &NewOrder, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
            INSERT INTO orders (
                order_id,
                school_id,
                trustee_id,
                student_name,
                student_id,
                student_email,
                gateway_name,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9);
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.school_id)
    .bind(&order.trustee_id)
    .bind(&order.student.name)
    .bind(&order.student.id)
    .bind(&order.student.email)
    .bind(&order.gateway_name)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn fetch_order_by_pk(pk: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1").bind(pk).fetch_optional(conn).await
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_id = $1").bind(order_id).fetch_optional(conn).await
}

pub async fn fetch_order_by_collect_id(
    collect_id: &CollectId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE collect_id = $1")
        .bind(collect_id)
        .fetch_optional(conn)
        .await
}

/// Writes the gateway correlation fields on an order. The caller is responsible for checking that
/// no different collect id is attached already.
pub async fn set_gateway_correlation(
    pk: i64,
    collect_id: &CollectId,
    gateway_sign: Option<&str>,
    payment_url: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    trace!("🗃️ Attaching collect id {collect_id} to order pk {pk}");
    sqlx::query(
        "UPDATE orders SET collect_id = $1, gateway_sign = $2, payment_url = $3, updated_at = $4 WHERE id = $5",
    )
    .bind(collect_id)
    .bind(gateway_sign)
    .bind(payment_url)
    .bind(Utc::now())
    .bind(pk)
    .execute(conn)
    .await?;
    Ok(())
}
