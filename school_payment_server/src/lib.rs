//! School Payment Server
//!
//! The HTTP face of the payment backend. It exposes the payment creation endpoint, the gateway's
//! webhook and callback receivers, status queries and the transaction listing, and delegates all
//! reconciliation semantics to [`school_payment_engine`].
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
