//! TLS acceptor for the TLS proxy listener.

use super::ca::server_config;
use rustls::pki_types::CertificateDer;
use std::io::Write;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Create TLS acceptor from certificate and key files.
pub fn create_tls_acceptor(cert_path: &str, key_path: &str) -> Result<TlsAcceptor, anyhow::Error> {
    // Load certificate chain
    let cert_file = std::fs::File::open(cert_path)
        .map_err(|e| anyhow::anyhow!("Failed to open certificate file '{cert_path}': {e}"))?;
    let mut cert_reader = std::io::BufReader::new(cert_file);
    let certs: Vec<CertificateDer> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| anyhow::anyhow!("Failed to parse certificate file: {e}"))?;

    if certs.is_empty() {
        anyhow::bail!("No certificates found in certificate file: {cert_path}");
    }

    // Load private key
    let key_file = std::fs::File::open(key_path)
        .map_err(|e| anyhow::anyhow!("Failed to open private key file '{key_path}': {e}"))?;
    let mut key_reader = std::io::BufReader::new(key_file);

    // Try reading as PKCS8, RSA, or EC private key
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| anyhow::anyhow!("Failed to parse private key file: {e}"))?
        .ok_or_else(|| anyhow::anyhow!("No private key found in key file: {key_path}"))?;

    let config = server_config(certs, key)?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Create a TLS acceptor from in-memory PEM material.
///
/// The PEM is written to temporary files only for as long as the acceptor
/// takes to load it; the files are removed before this returns.
pub fn acceptor_from_pem(cert_pem: &str, key_pem: &str) -> Result<TlsAcceptor, anyhow::Error> {
    let mut cert_file = tempfile::Builder::new()
        .prefix("cassette-cert")
        .suffix(".pem")
        .tempfile()?;
    cert_file.write_all(cert_pem.as_bytes())?;
    cert_file.flush()?;

    let mut key_file = tempfile::Builder::new()
        .prefix("cassette-key")
        .suffix(".pem")
        .tempfile()?;
    key_file.write_all(key_pem.as_bytes())?;
    key_file.flush()?;

    let cert_path = cert_file.path().to_string_lossy().into_owned();
    let key_path = key_file.path().to_string_lossy().into_owned();
    let acceptor = create_tls_acceptor(&cert_path, &key_path)?;

    cert_file.close()?;
    key_file.close()?;
    Ok(acceptor)
}
