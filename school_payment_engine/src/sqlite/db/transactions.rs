use log::trace;
use sqlx::{QueryBuilder, Row, SqliteConnection};

use crate::reconciliation::{TransactionQueryFilter, TransactionSummary};

const SUMMARY_COLUMNS: &str = r#"
    o.id, o.order_id, o.school_id, o.gateway_name, o.collect_id, o.student_name,
    s.order_amount, s.transaction_amount, s.status, s.payment_time, s.payment_mode, s.bank_reference
"#;

fn push_filters<'a>(builder: &mut QueryBuilder<'a, sqlx::Sqlite>, filter: &'a TransactionQueryFilter) {
    if filter.school_id.is_some() || filter.status.is_some() {
        builder.push(" WHERE ");
        let mut where_clause = builder.separated(" AND ");
        if let Some(school_id) = filter.school_id.as_deref() {
            where_clause.push("o.school_id = ");
            where_clause.push_bind_unseparated(school_id);
        }
        if let Some(status) = filter.status {
            where_clause.push("s.status = ");
            where_clause.push_bind_unseparated(status);
        }
    }
}

/// Fetches one page of the joined order/status listing, most recent payments first.
pub async fn search_transactions(
    filter: &TransactionQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<TransactionSummary>, sqlx::Error> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {SUMMARY_COLUMNS} FROM orders o JOIN order_statuses s ON s.order_pk = o.id"
    ));
    push_filters(&mut builder, filter);
    builder.push(" ORDER BY s.payment_time DESC, o.id DESC LIMIT ");
    builder.push_bind(filter.limit());
    builder.push(" OFFSET ");
    builder.push_bind(filter.offset());
    trace!("🗃️ Executing query: {}", builder.sql());
    builder.build_query_as::<TransactionSummary>().fetch_all(conn).await
}

/// The total number of rows matching the filter, ignoring pagination.
pub async fn count_transactions(
    filter: &TransactionQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let mut builder =
        QueryBuilder::new("SELECT COUNT(*) AS total FROM orders o JOIN order_statuses s ON s.order_pk = o.id");
    push_filters(&mut builder, filter);
    let row = builder.build().fetch_one(conn).await?;
    row.try_get("total")
}
