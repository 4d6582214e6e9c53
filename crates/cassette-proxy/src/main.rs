use anyhow::Context;
use cassette_proxy::admin_api::{AdminApiServer, AdminState};
use cassette_proxy::config::{CaConfig, Config, ConnectMode, UpstreamConfig};
use cassette_proxy::proxy::{
    acceptor_from_pem, CertificateAuthority, Forward, HttpForwarder, Pipeline, ProxyServer,
    UnavailableForwarder,
};
use cassette_proxy::store::Stores;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cassette-proxy", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[arg(long)]
    admin_port: Option<u16>,

    #[arg(long)]
    proxy_port: Option<u16>,

    #[arg(long)]
    tls_port: Option<u16>,

    #[arg(long)]
    chain_port: Option<u16>,

    /// Upstream proxy host for the chained listener
    #[arg(long, env = "PROXY_URL")]
    upstream_host: Option<String>,

    #[arg(long, env = "PROXY_PORT")]
    upstream_port: Option<String>,

    /// CA certificate PEM; a CA is generated when not given
    #[arg(long)]
    ca_cert: Option<String>,

    #[arg(long)]
    ca_key: Option<String>,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&args)?;
    let ca = Arc::new(load_ca(&config)?);
    let stores = Arc::new(Stores::new(config.mappings.on_conflict));
    let annotate = config.proxy.annotate_responses;
    let host = config.listen.host.as_str();

    let direct: Arc<dyn Forward> =
        Arc::new(HttpForwarder::direct(&config).context("Failed to build HTTP client")?);

    // Bind everything before serving so a port clash fails startup
    let admin_listener = bind(host, config.listen.admin_port, "admin").await?;
    let proxy_listener = bind(host, config.listen.proxy_port, "proxy").await?;
    let tls_listener = bind(host, config.listen.tls_port, "TLS").await?;
    let chain_listener = match config.upstream {
        Some(_) => Some(bind(host, config.listen.chain_port, "chained").await?),
        None => None,
    };

    let mut tasks: JoinSet<anyhow::Result<()>> = JoinSet::new();

    let admin = AdminApiServer::new(AdminState::new(Arc::clone(&stores), ca.cert_pem()));
    tasks.spawn(admin.serve(admin_listener));

    let plain = ProxyServer::new(
        Pipeline::new("proxy", Arc::clone(&stores), Arc::clone(&direct), annotate),
        Arc::clone(&ca),
        config.proxy.connect,
    );
    tasks.spawn(plain.serve(proxy_listener));

    let acceptor = acceptor_from_pem(ca.cert_pem(), ca.key_pem())
        .context("Failed to build TLS acceptor from the CA")?;
    let tls = ProxyServer::new(
        Pipeline::new("tls", Arc::clone(&stores), Arc::clone(&direct), annotate),
        Arc::clone(&ca),
        config.proxy.connect,
    )
    .with_tls(acceptor);
    tasks.spawn(tls.serve(tls_listener));

    if let (Some(upstream), Some(listener)) = (config.upstream.as_ref(), chain_listener) {
        let forwarder: Arc<dyn Forward> = match HttpForwarder::via_upstream(&config, upstream) {
            Ok(forwarder) => Arc::new(forwarder),
            Err(e) => {
                warn!("Chained listener will answer 502: {}", e);
                Arc::new(UnavailableForwarder::new(e.to_string()))
            }
        };
        let chain = ProxyServer::new(
            Pipeline::new("chain", Arc::clone(&stores), forwarder, annotate),
            Arc::clone(&ca),
            ConnectMode::Intercept,
        );
        tasks.spawn(chain.serve(listener));
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            Ok(())
        }
        Some(joined) = tasks.join_next() => {
            let result = joined
                .context("Listener task panicked")
                .and_then(|served| served);
            if let Err(ref e) = result {
                error!("Listener stopped: {:#}", e);
            }
            result
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path);
            Config::from_file(path).with_context(|| format!("Failed to load config '{path}'"))?
        }
        None => Config::default(),
    };

    if let Some(port) = args.admin_port {
        config.listen.admin_port = port;
    }
    if let Some(port) = args.proxy_port {
        config.listen.proxy_port = port;
    }
    if let Some(port) = args.tls_port {
        config.listen.tls_port = port;
    }
    if let Some(port) = args.chain_port {
        config.listen.chain_port = port;
    }

    // the chained listener needs both halves of the upstream address
    let current = config.upstream.take();
    let upstream_host = args
        .upstream_host
        .clone()
        .or_else(|| current.as_ref().map(|u| u.host.clone()))
        .filter(|h| !h.trim().is_empty());
    let upstream_port = args
        .upstream_port
        .clone()
        .or_else(|| current.as_ref().map(|u| u.port.clone()))
        .filter(|p| !p.trim().is_empty());
    if let (Some(host), Some(port)) = (upstream_host, upstream_port) {
        config.upstream = Some(UpstreamConfig { host, port });
    }

    if args.ca_cert.is_some() || args.ca_key.is_some() {
        let current = config.ca.take();
        config.ca = Some(CaConfig {
            cert_path: args
                .ca_cert
                .clone()
                .or_else(|| current.as_ref().map(|ca| ca.cert_path.clone()))
                .unwrap_or_default(),
            key_path: args
                .ca_key
                .clone()
                .or_else(|| current.as_ref().map(|ca| ca.key_path.clone()))
                .unwrap_or_default(),
        });
    }

    config.validate()?;
    Ok(config)
}

fn load_ca(config: &Config) -> anyhow::Result<CertificateAuthority> {
    match &config.ca {
        Some(ca) => {
            info!("Loading CA from {} and {}", ca.cert_path, ca.key_path);
            CertificateAuthority::load(Path::new(&ca.cert_path), Path::new(&ca.key_path))
                .context("Failed to load CA")
        }
        None => {
            info!("No CA configured, generating an ephemeral one (GET /ca.crt to trust it)");
            CertificateAuthority::generate().context("Failed to generate CA")
        }
    }
}

async fn bind(host: &str, port: u16, name: &str) -> anyhow::Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {name} listener on {host}:{port}"))
}
