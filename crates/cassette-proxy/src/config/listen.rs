//! Listener addresses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// Admin API.
    #[serde(default = "default_admin_port")]
    pub admin_port: u16,
    /// Plaintext forward proxy.
    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,
    /// TLS-terminating proxy.
    #[serde(default = "default_tls_port")]
    pub tls_port: u16,
    /// Upstream-chained proxy, only bound when an upstream is configured.
    #[serde(default = "default_chain_port")]
    pub chain_port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_admin_port() -> u16 {
    8080
}

fn default_proxy_port() -> u16 {
    8081
}

fn default_tls_port() -> u16 {
    8082
}

fn default_chain_port() -> u16 {
    8083
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            admin_port: default_admin_port(),
            proxy_port: default_proxy_port(),
            tls_port: default_tls_port(),
            chain_port: default_chain_port(),
        }
    }
}
