//! # SQLite database methods
//!
//! "Low-level" SQLite interactions live here, as simple functions (rather than stateful structs)
//! that accept a `&mut SqliteConnection` argument. Callers obtain a connection from a pool, or
//! open a transaction and pass `&mut *tx`, without any other changes.
use std::{env, str::FromStr};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod orders;
pub mod statuses;
pub mod transactions;
pub mod webhook_logs;

const SQLITE_DB_URL: &str = "sqlite://data/school_payments.db";

pub fn db_url() -> String {
    let result = env::var("SPS_DATABASE_URL").unwrap_or_else(|_| {
        info!("SPS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
