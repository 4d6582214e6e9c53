//! Admin REST API over the call and mapping stores.
//!
//! This module provides:
//! - Listing, importing and clearing captured calls
//! - Managing mappings and their replayed bodies
//! - Promoting a call into a mapping
//! - Health, metrics and the CA certificate
//!
//! The API listens on a configurable port (default: 8080).

mod handlers;
mod router;
mod server;
mod types;

pub use server::AdminApiServer;

use crate::store::Stores;
use std::sync::Arc;

/// State shared by every admin request.
pub struct AdminState {
    pub stores: Arc<Stores>,
    pub ca_cert_pem: String,
}

impl AdminState {
    pub fn new(stores: Arc<Stores>, ca_cert_pem: impl Into<String>) -> Self {
        Self {
            stores,
            ca_cert_pem: ca_cert_pem.into(),
        }
    }
}
