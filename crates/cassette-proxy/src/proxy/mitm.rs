//! CONNECT handling: TLS interception or blind tunnelling.
//!
//! In intercept mode the client's TLS session is terminated with a leaf
//! certificate for the CONNECT host, and the decrypted requests run through
//! the same pipeline as plaintext traffic with scheme `https`.

use super::ca::CertificateAuthority;
use super::error::error_response;
use super::handler::Pipeline;
use super::response_ext::{full_body, ProxyBody, ResponseExt};
use crate::config::ConnectMode;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::http::uri::{Authority, Scheme};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::upgrade::Upgraded;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, trace};

/// Answer a CONNECT request and take over the upgraded connection in the
/// background.
pub fn handle_connect(
    req: Request<Incoming>,
    mode: ConnectMode,
    ca: Arc<CertificateAuthority>,
    pipeline: Pipeline,
) -> Response<ProxyBody> {
    let Some(authority) = req.uri().authority().cloned() else {
        return error_response(StatusCode::BAD_REQUEST, "CONNECT target must be host:port");
    };

    tokio::spawn(async move {
        let upgraded = match hyper::upgrade::on(req).await {
            Ok(upgraded) => upgraded,
            Err(e) => {
                error!("Upgrade failed for CONNECT {}: {}", authority, e);
                return;
            }
        };
        let result = match mode {
            ConnectMode::Intercept => intercept(upgraded, &authority, &ca, pipeline).await,
            ConnectMode::Tunnel => {
                let port = authority.port_u16().unwrap_or(443);
                tunnel(TokioIo::new(upgraded), authority.host(), port)
                    .await
                    .map_err(anyhow::Error::from)
            }
        };
        if let Err(e) = result {
            error!("CONNECT {} ({:?}) ended with error: {:#}", authority, mode, e);
        }
    });

    Response::new(full_body(Bytes::new()))
}

async fn intercept(
    upgraded: Upgraded,
    authority: &Authority,
    ca: &CertificateAuthority,
    pipeline: Pipeline,
) -> anyhow::Result<()> {
    let host = bare_host(authority.host());
    let acceptor = TlsAcceptor::from(ca.server_config_for(host)?);
    let stream = acceptor.accept(TokioIo::new(upgraded)).await?;
    debug!(%authority, "Intercepting CONNECT tunnel");

    let target = authority.to_string();
    let service = service_fn(move |req: Request<Incoming>| {
        let pipeline = pipeline.clone();
        let target = target.clone();
        async move { Ok::<_, Infallible>(handle_inner(req, &pipeline, &target).await) }
    });

    http1::Builder::new()
        .serve_connection(TokioIo::new(stream), service)
        .await?;
    Ok(())
}

async fn handle_inner(
    req: Request<Incoming>,
    pipeline: &Pipeline,
    target: &str,
) -> Response<ProxyBody> {
    if req.method() == Method::CONNECT {
        return Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Full::new(Bytes::from("Nested CONNECT not supported")))
            .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
            .into_proxy_body();
    }
    pipeline.handle(req, Scheme::HTTPS, Some(target)).await
}

// IPv6 authorities keep their brackets; certificates and sockets want the bare address
fn bare_host(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}

/// Copy bytes both ways between the client and `host:port` until either side closes.
pub async fn tunnel<S>(mut client: S, host: &str, port: u16) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    trace!("tunnel: connecting to {}:{}", host, port);
    let mut server = tokio::net::TcpStream::connect((bare_host(host), port)).await?;
    let (up, down) = tokio::io::copy_bidirectional(&mut client, &mut server).await?;
    info!("Tunnel to {}:{} closed ({} bytes up, {} bytes down)", host, port, up, down);
    Ok(())
}
