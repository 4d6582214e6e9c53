//! Configuration types for the cassette proxy.
//!
//! Everything has a default, so an empty YAML file (or no file at all) yields
//! the standard listener set on ports 8080-8083.

mod listen;
mod upstream;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use crate::store::WritePolicy;
pub use listen::ListenConfig;
pub use upstream::{ConnectionPoolConfig, ForwardConfig, UpstreamConfig};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,

    /// Upstream proxy for the chained listener. The chained listener is only
    /// started when this is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamConfig>,

    #[serde(default)]
    pub forward: ForwardConfig,

    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub mappings: MappingsConfig,

    /// CA used for the TLS listener and CONNECT interception. Generated at
    /// startup when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<CaConfig>,
}

/// How the plaintext listener treats `CONNECT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectMode {
    /// Terminate TLS with a minted leaf certificate and record the traffic.
    #[default]
    Intercept,
    /// Splice bytes between client and target without looking at them.
    Tunnel,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub connect: ConnectMode,
    /// Add `x-cassette-call-id` / `x-cassette-mapping-id` to proxied responses.
    #[serde(default = "default_true")]
    pub annotate_responses: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            connect: ConnectMode::default(),
            annotate_responses: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MappingsConfig {
    #[serde(default)]
    pub on_conflict: WritePolicy,
}

/// PEM files for the CA certificate and its private key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaConfig {
    pub cert_path: String,
    pub key_path: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let mut ports = vec![
            ("admin", self.listen.admin_port),
            ("proxy", self.listen.proxy_port),
            ("tls", self.listen.tls_port),
        ];
        if self.upstream.is_some() {
            ports.push(("chain", self.listen.chain_port));
        }

        let mut seen = HashSet::new();
        for (name, port) in &ports {
            // port 0 asks the OS for a free port, so duplicates are fine
            if *port != 0 && !seen.insert(*port) {
                anyhow::bail!("Port {port} for the {name} listener is already used by another listener");
            }
        }

        if let Some(ref ca) = self.ca {
            if ca.cert_path.is_empty() || ca.key_path.is_empty() {
                anyhow::bail!("Both 'ca.cert_path' and 'ca.key_path' must be set");
            }
        }

        if self.forward.timeout_secs == 0 {
            anyhow::bail!("'forward.timeout_secs' must be greater than zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.listen.admin_port, 8080);
        assert_eq!(config.listen.proxy_port, 8081);
        assert_eq!(config.listen.tls_port, 8082);
        assert_eq!(config.listen.chain_port, 8083);
        assert!(config.upstream.is_none());
        assert_eq!(config.proxy.connect, ConnectMode::Intercept);
        assert!(config.proxy.annotate_responses);
        assert_eq!(config.mappings.on_conflict, WritePolicy::Overwrite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
listen:
  host: 127.0.0.1
  admin_port: 9000
  proxy_port: 9001
upstream:
  host: corp-proxy
  port: 3128
forward:
  timeout_secs: 5
  retries: 2
proxy:
  connect: tunnel
  annotate_responses: false
mappings:
  on_conflict: reject
ca:
  cert_path: /etc/cassette/ca.pem
  key_path: /etc/cassette/ca.key
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen.host, "127.0.0.1");
        assert_eq!(config.listen.admin_port, 9000);
        assert_eq!(config.listen.tls_port, 8082);
        assert_eq!(config.upstream.as_ref().unwrap().port, "3128");
        assert_eq!(config.forward.timeout_secs, 5);
        assert_eq!(config.forward.retries, 2);
        assert_eq!(config.proxy.connect, ConnectMode::Tunnel);
        assert!(!config.proxy.annotate_responses);
        assert_eq!(config.mappings.on_conflict, WritePolicy::Reject);
        assert!(config.ca.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_ports_rejected() {
        let mut config = Config::default();
        config.listen.tls_port = config.listen.proxy_port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chain_port_only_checked_with_upstream() {
        let mut config = Config::default();
        config.listen.chain_port = config.listen.admin_port;
        assert!(config.validate().is_ok());

        config.upstream = Some(UpstreamConfig {
            host: "p".into(),
            port: "1".into(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ca_paths_must_be_paired() {
        let mut config = Config::default();
        config.ca = Some(CaConfig {
            cert_path: "ca.pem".into(),
            key_path: String::new(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cassette.yaml");
        std::fs::write(&path, "listen:\n  proxy_port: 18081\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.listen.proxy_port, 18081);
    }
}
