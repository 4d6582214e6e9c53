//! Proxy listeners and the interception pipeline.
//!
//! # Module Structure
//!
//! - `normalize` - absolute URL + buffered body + canonical request record
//! - `matcher` - mapping lookup and stub responses
//! - `forwarding` / `client` - live requests to the origin or upstream proxy
//! - `capture` - response buffering and call storage
//! - `handler` - the pipeline tying the above together
//! - `server` / `mitm` - accept loops, CONNECT interception and tunnelling
//! - `ca` / `tls` - certificate authority and TLS acceptors

mod ca;
mod capture;
mod client;
mod error;
mod forwarding;
mod handler;
mod headers;
mod matcher;
mod mitm;
mod normalize;
mod response_ext;
mod server;
mod tls;

#[cfg(test)]
mod tests;

pub use ca::CertificateAuthority;
pub use capture::{capture_response, Captured};
pub use error::{error_response, ForwardError, ProxyError};
pub use forwarding::{Forward, HttpForwarder, UnavailableForwarder};
pub use handler::Pipeline;
pub use headers::{X_CASSETTE_CALL_ID, X_CASSETTE_ERROR, X_CASSETTE_MAPPING_ID};
pub use matcher::{find_mapping, stub_response};
pub use normalize::{normalize, NormalizedRequest};
pub use response_ext::{full_body, BoxError, ProxyBody};
pub use server::ProxyServer;
pub use tls::{acceptor_from_pem, create_tls_acceptor};
