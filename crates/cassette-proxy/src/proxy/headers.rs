//! Header names used by the proxy and hop-by-hop filtering.
//!
//! Static header names avoid runtime `.parse()` calls on hot paths.

use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION};
use hyper::Response;
use std::collections::HashSet;

pub static X_CASSETTE_CALL_ID: HeaderName = HeaderName::from_static("x-cassette-call-id");
pub static X_CASSETTE_MAPPING_ID: HeaderName = HeaderName::from_static("x-cassette-mapping-id");
pub static X_CASSETTE_ERROR: HeaderName = HeaderName::from_static("x-cassette-error");

// RFC 7230 section 6.1, plus the non-standard Proxy-Connection
static HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Extension trait for inserting cassette headers into responses.
pub trait CassetteHeadersExt {
    /// Insert a header with a static name and dynamic string value.
    /// Returns false if the value couldn't be converted to a valid header value.
    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool;
}

impl<B> CassetteHeadersExt for Response<B> {
    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool {
        match HeaderValue::from_str(value) {
            Ok(header_value) => {
                self.headers_mut().insert(name.clone(), header_value);
                true
            }
            Err(_) => false,
        }
    }
}

// Lowercased tokens named by the Connection header
fn connection_tokens(headers: &HeaderMap) -> HashSet<String> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Remove hop-by-hop headers, including any the Connection header names.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for token in connection_tokens(headers) {
        headers.remove(token.as_str());
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}
