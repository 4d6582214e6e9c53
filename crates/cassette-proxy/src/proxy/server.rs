//! ProxyServer struct and accept loop.
//!
//! One `ProxyServer` per listener: plaintext, TLS-terminating, or chained
//! through the upstream proxy. They differ only in the pipeline they feed and
//! whether connections start with a TLS handshake.

use super::ca::CertificateAuthority;
use super::handler::Pipeline;
use super::mitm::handle_connect;
use super::response_ext::ProxyBody;
use crate::config::ConnectMode;
use hyper::body::Incoming;
use hyper::http::uri::Scheme;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

/// The proxy listener.
pub struct ProxyServer {
    pipeline: Pipeline,
    ca: Arc<CertificateAuthority>,
    connect: ConnectMode,
    tls: Option<TlsAcceptor>,
}

impl ProxyServer {
    pub fn new(pipeline: Pipeline, ca: Arc<CertificateAuthority>, connect: ConnectMode) -> Self {
        Self {
            pipeline,
            ca,
            connect,
            tls: None,
        }
    }

    /// Terminate TLS on every accepted connection before reading HTTP.
    pub fn with_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some(acceptor);
        self
    }

    fn scheme(&self) -> Scheme {
        if self.tls.is_some() {
            Scheme::HTTPS
        } else {
            Scheme::HTTP
        }
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let addr = listener.local_addr()?;
        info!(
            "{} proxy listening on {}://{} (CONNECT: {:?})",
            self.pipeline.label(),
            self.scheme().as_str(),
            addr,
            self.connect
        );

        let server = Arc::new(self);
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let server = Arc::clone(&server);

            tokio::spawn(async move {
                match server.tls.clone() {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls_stream) => server.serve_io(tls_stream, remote_addr).await,
                        Err(err) => {
                            error!("TLS handshake failed from {}: {}", remote_addr, err);
                        }
                    },
                    None => server.serve_io(stream, remote_addr).await,
                }
            });
        }
    }

    async fn serve_io<I>(self: Arc<Self>, io: I, remote_addr: SocketAddr)
    where
        I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let scheme = self.scheme();
        let server = self;
        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            let scheme = scheme.clone();
            async move { Ok::<_, Infallible>(server.dispatch(req, scheme).await) }
        });

        if let Err(err) = http1::Builder::new()
            .serve_connection(TokioIo::new(io), service)
            .with_upgrades()
            .await
        {
            debug!("Error serving connection from {}: {}", remote_addr, err);
        }
    }

    async fn dispatch(&self, req: Request<Incoming>, scheme: Scheme) -> Response<ProxyBody> {
        if req.method() == Method::CONNECT {
            return handle_connect(
                req,
                self.connect,
                Arc::clone(&self.ca),
                self.pipeline.clone(),
            );
        }
        self.pipeline.handle(req, scheme, None).await
    }
}
