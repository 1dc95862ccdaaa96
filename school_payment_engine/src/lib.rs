//! School Payment Engine
//!
//! The engine keeps a local order's payment status consistent across the three sources of truth
//! that report on it: the gateway's create-request response, backend-initiated status polls, and
//! asynchronous webhook callbacks (POST bodies and GET redirects alike).
//!
//! The crate is divided into three main sections:
//! 1. The database types and storage seam ([`db_types`] and [`traits`]). Backends implement
//!    [`traits::ReconciliationDatabase`]; SQLite is the bundled implementation.
//! 2. The reconciliation API ([`ReconciliationApi`]). Every status-bearing event, regardless of
//!    its source, is funnelled through this facade, which normalizes gateway status strings,
//!    writes the webhook audit trail and applies merge-style status upserts.
//! 3. Helpers ([`helpers`]), such as order correlation-id generation.
pub mod db_types;
pub mod helpers;
mod reconciliation;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use reconciliation::{
    PollResult,
    ReconciliationApi,
    ReconciliationError,
    StatusSnapshot,
    TransactionPage,
    TransactionQueryFilter,
    TransactionSummary,
    WebhookOutcome,
};
