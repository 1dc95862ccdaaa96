use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::{NewWebhookLog, WebhookLog};

/// Appends an audit entry. Every inbound notification lands here exactly once, before any attempt
/// is made to apply it.
pub async fn insert_log(log: &NewWebhookLog, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO webhook_logs (payload, reported_status, order_token, created_at)
            VALUES ($1, $2, $3, $4);
        "#,
    )
    .bind(&log.payload)
    .bind(log.reported_status.as_deref())
    .bind(log.order_token.as_deref())
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn mark_processed(log_id: i64, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result =
        sqlx::query("UPDATE webhook_logs SET processed = 1 WHERE id = $1").bind(log_id).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn record_error(log_id: i64, error: &str, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE webhook_logs SET processing_error = $1 WHERE id = $2")
        .bind(error)
        .bind(log_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn fetch_log(log_id: i64, conn: &mut SqliteConnection) -> Result<Option<WebhookLog>, sqlx::Error> {
    sqlx::query_as::<_, WebhookLog>("SELECT * FROM webhook_logs WHERE id = $1")
        .bind(log_id)
        .fetch_optional(conn)
        .await
}
