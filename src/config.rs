//! # Configuration Management
//!
//! Runtime configuration for the overlay proxy: the listen address and the
//! upstream registry to forward to. Values come from CLI flags with
//! environment overrides (`PORT`, `npm_config_registry`), resolved by the
//! binary's clap definition; this module only holds the resolved settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default upstream registry, matching the public npm registry root.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Default listen port, the conventional private-registry port.
pub const DEFAULT_PORT: u16 = 4873;

/// Resolved server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind the listening socket to
    pub host: String,
    /// Port to bind the listening socket to
    pub port: u16,
    /// Base URL of the upstream registry (no trailing slash)
    pub registry_url: String,
    /// Timeout in seconds for upstream metadata fetches
    pub upstream_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            upstream_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn new(host: String, port: u16, registry_url: &str) -> Self {
        Self {
            host,
            port,
            registry_url: registry_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Socket address string for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_strips_trailing_slash_from_registry_url() {
        let config = Config::new("0.0.0.0".into(), 4873, "https://registry.npmjs.org/");
        assert_eq!(config.registry_url, "https://registry.npmjs.org");
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        let config = Config::new("127.0.0.1".into(), 8080, DEFAULT_REGISTRY_URL);
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }
}
