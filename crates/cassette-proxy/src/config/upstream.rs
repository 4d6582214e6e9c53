//! Upstream proxy, forwarding and connection pool configuration.

use serde::{Deserialize, Deserializer, Serialize};

/// Optional upstream proxy every chained-listener request goes through.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Host or URL of the upstream proxy, e.g. `proxy.local` or `http://proxy.local`.
    pub host: String,
    /// Kept as text so a bad value only fails the requests that need it.
    #[serde(deserialize_with = "string_or_number")]
    pub port: String,
}

impl UpstreamConfig {
    /// Build the proxy URL handed to the HTTP client.
    pub fn proxy_url(&self) -> Result<String, String> {
        let host = self.host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err("upstream proxy host is empty".to_string());
        }
        let port: u16 = self
            .port
            .trim()
            .parse()
            .map_err(|_| format!("invalid upstream proxy port '{}'", self.port))?;

        if host.contains("://") {
            Ok(format!("{host}:{port}"))
        } else {
            Ok(format!("http://{host}:{port}"))
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }
    Ok(match Port::deserialize(deserializer)? {
        Port::Text(s) => s,
        Port::Number(n) => n.to_string(),
    })
}

/// Live forwarding behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwardConfig {
    /// Whole-request timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Extra attempts after a connection failure.
    #[serde(default)]
    pub retries: u32,
    /// Also retry POST/PATCH/CONNECT.
    #[serde(default)]
    pub retry_non_idempotent: bool,
}

fn default_timeout() -> u64 {
    30
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            retries: 0,
            retry_non_idempotent: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionPoolConfig {
    #[serde(default = "default_pool_max_idle_per_host")]
    pub max_idle_per_host: usize,

    #[serde(default = "default_pool_idle_timeout")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_keepalive_timeout")]
    pub keepalive_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: default_pool_max_idle_per_host(),
            idle_timeout_secs: default_pool_idle_timeout(),
            keepalive_timeout_secs: default_keepalive_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_pool_max_idle_per_host() -> usize {
    32
}

fn default_pool_idle_timeout() -> u64 {
    90
}

fn default_keepalive_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}
