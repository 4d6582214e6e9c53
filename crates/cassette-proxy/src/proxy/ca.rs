//! Certificate authority for the TLS listener and CONNECT interception.
//!
//! Leaf certificates are minted per host on first use and cached as ready
//! rustls server configs.

use anyhow::Context;
use parking_lot::RwLock;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    Issuer, KeyPair, KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const CA_COMMON_NAME: &str = "Cassette Proxy CA";
const CA_ORGANIZATION: &str = "Cassette";

pub struct CertificateAuthority {
    cert_pem: String,
    key_pem: String,
    cert_der: CertificateDer<'static>,
    issuer: Issuer<'static, KeyPair>,
    leaf_cache: RwLock<HashMap<String, Arc<ServerConfig>>>,
}

impl CertificateAuthority {
    /// Generate a fresh CA keypair. Lives only as long as the process.
    pub fn generate() -> anyhow::Result<Self> {
        let mut params =
            CertificateParams::new(Vec::<String>::new()).context("failed to create CA params")?;
        params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, CA_COMMON_NAME);
        params
            .distinguished_name
            .push(DnType::OrganizationName, CA_ORGANIZATION);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::CrlSign,
        ];

        let key_pair = KeyPair::generate().context("failed to generate CA key pair")?;
        let cert = params
            .self_signed(&key_pair)
            .context("failed to self-sign CA certificate")?;
        let cert_pem = cert.pem();
        let key_pem = key_pair.serialize_pem();
        let cert_der = cert.der().clone();

        info!("Generated ephemeral CA certificate");
        Ok(Self {
            cert_pem,
            key_pem,
            cert_der,
            issuer: Issuer::new(params, key_pair),
            leaf_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Use an existing CA from PEM text.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> anyhow::Result<Self> {
        let key_pair = KeyPair::from_pem(key_pem).context("failed to parse CA private key")?;
        let cert_der = rustls_pemfile::certs(&mut cert_pem.as_bytes())
            .next()
            .ok_or_else(|| anyhow::anyhow!("no certificate found in CA PEM"))?
            .context("failed to parse CA certificate")?;
        let issuer = Issuer::from_ca_cert_pem(cert_pem, key_pair)
            .context("failed to load CA certificate as issuer")?;

        Ok(Self {
            cert_pem: cert_pem.to_string(),
            key_pem: key_pem.to_string(),
            cert_der,
            issuer,
            leaf_cache: RwLock::new(HashMap::new()),
        })
    }

    /// Load the CA from PEM files.
    pub fn load(cert_path: &Path, key_path: &Path) -> anyhow::Result<Self> {
        let cert_pem = std::fs::read_to_string(cert_path)
            .with_context(|| format!("failed to read CA certificate {}", cert_path.display()))?;
        let key_pem = std::fs::read_to_string(key_path)
            .with_context(|| format!("failed to read CA key {}", key_path.display()))?;
        let ca = Self::from_pem(&cert_pem, &key_pem)?;
        info!("Loaded CA certificate from {}", cert_path.display());
        Ok(ca)
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    /// TLS server config presenting a leaf certificate for `host`.
    pub fn server_config_for(&self, host: &str) -> anyhow::Result<Arc<ServerConfig>> {
        if let Some(config) = self.leaf_cache.read().get(host) {
            return Ok(Arc::clone(config));
        }

        let config = Arc::new(self.mint_leaf(host)?);
        self.leaf_cache
            .write()
            .insert(host.to_string(), Arc::clone(&config));
        debug!(%host, "Minted leaf certificate");
        Ok(config)
    }

    fn mint_leaf(&self, host: &str) -> anyhow::Result<ServerConfig> {
        let mut params = CertificateParams::new(vec![host.to_string()])
            .with_context(|| format!("invalid host for certificate: {host}"))?;
        params.is_ca = IsCa::NoCa;
        params.distinguished_name = DistinguishedName::new();
        params.distinguished_name.push(DnType::CommonName, host);
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

        let key_pair = KeyPair::generate().context("failed to generate leaf key pair")?;
        let cert = params
            .signed_by(&key_pair, &self.issuer)
            .context("failed to sign leaf certificate")?;

        let chain = vec![cert.der().clone(), self.cert_der.clone()];
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
        server_config(chain, key)
    }
}

/// HTTP/1.1 server config using the ring provider.
pub fn server_config(
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> anyhow::Result<ServerConfig> {
    let mut config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .context("failed to select TLS protocol versions")?
            .with_no_client_auth()
            .with_single_cert(chain, key)
            .context("failed to build TLS configuration")?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}
