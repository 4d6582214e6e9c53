//! Cassette: a record-and-replay intercepting HTTP/HTTPS proxy.
//!
//! Every request that reaches a proxy listener is either answered from a
//! stored mapping or forwarded live and captured into the call store. The
//! admin API promotes captured calls into mappings.

pub mod admin_api;
pub mod config;
pub mod metrics;
pub mod proxy;
pub mod record;
pub mod store;
