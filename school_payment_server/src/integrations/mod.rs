//! Clients for the upstream services the server talks to.
mod edviron;

pub use edviron::{CollectRequest, EdvironApi, EdvironApiError};
