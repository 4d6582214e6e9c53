//! Request normalization.
//!
//! Turns an intercepted request into an absolute-URI request with a buffered
//! body, plus the [`record::Request`] used for matching and capture. The body
//! is read exactly once here; everything downstream shares those bytes.

use super::error::ProxyError;
use super::response_ext::BoxError;
use crate::record::{self, parse_forms, HeaderMultiMap};
use http_body_util::BodyExt;
use hyper::body::{Body, Bytes};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::http::uri::{Authority, PathAndQuery, Scheme};
use hyper::{Request, Uri};

pub struct NormalizedRequest {
    /// Ready to hand to a forwarder.
    pub forward: Request<Bytes>,
    /// Canonical form, used for matching and stored with the capture.
    pub record: record::Request,
}

/// Normalize `req` received on a connection using `scheme`.
///
/// `default_authority` is the CONNECT target for requests arriving inside an
/// intercepted tunnel; it is only used when the request carries no Host.
pub async fn normalize<B>(
    req: Request<B>,
    scheme: &Scheme,
    default_authority: Option<&str>,
) -> Result<NormalizedRequest, ProxyError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let (mut parts, body) = req.into_parts();

    let uri = absolute_uri(&parts.uri, &parts.headers, scheme, default_authority)?;

    let body = body
        .collect()
        .await
        .map_err(|e| ProxyError::RequestBody(Into::<BoxError>::into(e).to_string()))?
        .to_bytes();

    let method = parts.method.as_str().to_string();
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let forms = parse_forms(&method, content_type, uri.query(), &body);

    let mut header = HeaderMultiMap::from_header_map(&parts.headers);
    header.remove("Host");

    let record = record::Request {
        url: uri.to_string(),
        method,
        header,
        form: forms.form,
        post_form: forms.post_form,
    };

    parts.uri = uri;
    Ok(NormalizedRequest {
        forward: Request::from_parts(parts, body),
        record,
    })
}

fn absolute_uri(
    uri: &Uri,
    headers: &hyper::HeaderMap,
    scheme: &Scheme,
    default_authority: Option<&str>,
) -> Result<Uri, ProxyError> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Ok(uri.clone());
    }

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .or(default_authority)
        .ok_or(ProxyError::MissingHost)?;

    let authority: Authority = host
        .parse()
        .map_err(|e| ProxyError::InvalidTarget(format!("bad host '{host}': {e}")))?;
    let path_and_query = uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    Uri::builder()
        .scheme(scheme.clone())
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| ProxyError::InvalidTarget(e.to_string()))
}
