use chrono::Utc;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::db_types::OrderId;

/// Generates a fresh client-facing correlation id of the form `ORD_<unix-millis>_<5 chars>`.
///
/// The timestamp makes ids roughly sortable by creation time; the random suffix disambiguates
/// orders created in the same millisecond. Global uniqueness is enforced by the store.
pub fn new_order_id() -> OrderId {
    let suffix: String =
        thread_rng().sample_iter(&Alphanumeric).take(5).map(|c| (c as char).to_ascii_lowercase()).collect();
    OrderId::from(format!("ORD_{}_{suffix}", Utc::now().timestamp_millis()))
}
