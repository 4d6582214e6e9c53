//! HTTP client creation and configuration.
//!
//! One client per forwarding route: direct to the origin, or through the
//! configured upstream proxy.

use super::error::ForwardError;
use crate::config::ConnectionPoolConfig;
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::{info, warn};

/// Where live requests go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Straight to the origin. Environment proxy settings are ignored.
    Direct,
    /// Through an HTTP proxy at this URL. Certificate verification is off.
    Upstream(String),
}

/// Create a client with connection pooling for `route`.
///
/// Redirects are never followed and bodies are passed through untouched (no
/// transparent decompression), so captures hold exactly what the origin sent.
pub fn create_http_client(
    route: &Route,
    pool: &ConnectionPoolConfig,
) -> Result<reqwest::Client, ForwardError> {
    let mut builder = reqwest::Client::builder()
        .redirect(Policy::none())
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
        .tcp_keepalive(Duration::from_secs(pool.keepalive_timeout_secs))
        .connect_timeout(Duration::from_secs(pool.connect_timeout_secs));

    builder = match route {
        Route::Direct => builder.no_proxy(),
        Route::Upstream(url) => {
            let proxy = reqwest::Proxy::all(url.as_str())
                .map_err(|e| ForwardError::InvalidUpstream(format!("{url}: {e}")))?;
            warn!(
                "TLS certificate verification DISABLED for traffic through upstream proxy {}",
                url
            );
            builder.proxy(proxy).danger_accept_invalid_certs(true)
        }
    };

    let client = builder.build().map_err(|e| match route {
        Route::Direct => ForwardError::Request(e.to_string()),
        Route::Upstream(url) => ForwardError::InvalidUpstream(format!("{url}: {e}")),
    })?;

    info!(
        "Connection pool configured: max_idle={}, idle_timeout={}s, keepalive={}s, route={:?}",
        pool.max_idle_per_host, pool.idle_timeout_secs, pool.keepalive_timeout_secs, route
    );

    Ok(client)
}
