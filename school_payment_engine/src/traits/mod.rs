//! The storage seam for the reconciliation engine.
//!
//! Backends implement [`ReconciliationDatabase`]; everything above this trait is
//! storage-agnostic.
mod reconciliation_database;

pub use reconciliation_database::{PaymentStoreError, ReconciliationDatabase};
