//! Route dispatch logic for the Admin API.

use crate::admin_api::handlers::{calls, files, mappings, recordings, system};
use crate::admin_api::types::{get_base_url, not_found};
use crate::admin_api::AdminState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

/// Parsed admin route
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Root,
    Health,
    Metrics,
    CaCert,
    /// GET/POST/DELETE /requests
    Calls,
    /// GET /requests/:id
    Call(&'a str),
    /// GET /mappings
    Mappings,
    /// GET/PUT/DELETE /mappings/:id
    Mapping(&'a str),
    /// POST /recordings/:id
    Recording(&'a str),
    /// GET/PUT /files/:id
    File(&'a str),
}

impl<'a> Route<'a> {
    /// Parse route from path segments, ignoring a trailing slash
    fn parse(segments: &[&'a str]) -> Option<Self> {
        let segments = match segments {
            [rest @ .., ""] => rest,
            all => all,
        };
        match segments {
            [] => Some(Route::Root),
            ["health"] => Some(Route::Health),
            ["metrics"] => Some(Route::Metrics),
            ["ca.crt"] => Some(Route::CaCert),
            ["requests"] => Some(Route::Calls),
            ["requests", id] if !id.is_empty() => Some(Route::Call(*id)),
            ["mappings"] => Some(Route::Mappings),
            ["mappings", id] if !id.is_empty() => Some(Route::Mapping(*id)),
            ["recordings", id] if !id.is_empty() => Some(Route::Recording(*id)),
            ["files", id] if !id.is_empty() => Some(Route::File(*id)),
            _ => None,
        }
    }
}

/// Split a request path into percent-decoded segments. A segment that does
/// not decode to UTF-8 is kept as sent.
fn path_segments(path: &str) -> Vec<Cow<'_, str>> {
    path.trim_start_matches('/')
        .split('/')
        .map(|s| urlencoding::decode(s).unwrap_or(Cow::Borrowed(s)))
        .collect()
}

/// Main request router
pub async fn route_request(
    req: Request<Incoming>,
    state: Arc<AdminState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let base_url = get_base_url(&req);

    debug!("Admin API: {} {}", method, path);

    let decoded = path_segments(&path);
    let segments: Vec<&str> = decoded.iter().map(|s| s.as_ref()).collect();
    let Some(route) = Route::parse(&segments) else {
        return Ok(not_found());
    };

    let response = match (&method, route) {
        (&Method::GET, Route::Root) => system::handle_root(&base_url),
        (&Method::GET, Route::Health) => system::handle_health(),
        (&Method::GET, Route::Metrics) => system::handle_metrics(&state),
        (&Method::GET, Route::CaCert) => system::handle_ca_cert(&state),

        // /requests
        (&Method::GET, Route::Calls) => calls::handle_list(&state),
        (&Method::POST, Route::Calls) => calls::handle_import(req, &state).await,
        (&Method::DELETE, Route::Calls) => calls::handle_clear(&state),
        (&Method::GET, Route::Call(id)) => calls::handle_get(id, &state),

        // /mappings
        (&Method::GET, Route::Mappings) => mappings::handle_list(&state),
        (&Method::GET, Route::Mapping(id)) => mappings::handle_get(id, &state),
        (&Method::PUT, Route::Mapping(id)) => mappings::handle_put(id, req, &state).await,
        (&Method::DELETE, Route::Mapping(id)) => mappings::handle_delete(id, &state),

        // /recordings/:id
        (&Method::POST, Route::Recording(id)) => recordings::handle_promote(id, &state),

        // /files/:id
        (&Method::GET, Route::File(id)) => files::handle_get(id, &state),
        (&Method::PUT, Route::File(id)) => files::handle_put(id, req, &state).await,

        _ => not_found(),
    };
    Ok(response)
}
