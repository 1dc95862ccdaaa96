//! The reconciliation engine: the single funnel through which creation results, poll results and
//! webhook events become status-record transitions.
mod api;
mod errors;
mod objects;

pub use api::ReconciliationApi;
pub use errors::ReconciliationError;
pub use objects::{
    PollResult,
    StatusSnapshot,
    TransactionPage,
    TransactionQueryFilter,
    TransactionSummary,
    WebhookOutcome,
};
