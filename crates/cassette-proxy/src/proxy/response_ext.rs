//! Response body type shared by the proxy pipeline.

use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::Response;
use std::convert::Infallible;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body of every response produced by a proxy listener. Origin responses
/// start out streaming; everything the pipeline builds itself is buffered.
pub type ProxyBody = UnsyncBoxBody<Bytes, BoxError>;

/// A buffered body.
pub fn full_body(bytes: impl Into<Bytes>) -> ProxyBody {
    Full::new(bytes.into())
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

/// Extension trait for `Response<Full<Bytes>>` providing common transformations.
pub trait ResponseExt {
    /// Convert the response body into a [`ProxyBody`].
    fn into_proxy_body(self) -> Response<ProxyBody>;
}

impl ResponseExt for Response<Full<Bytes>> {
    fn into_proxy_body(self) -> Response<ProxyBody> {
        self.map(|b| b.map_err(|never: Infallible| match never {}).boxed_unsync())
    }
}
