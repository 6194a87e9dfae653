use serde::{Deserialize, Serialize};

/// Used when no servers are configured and the system resolver config is unreadable
pub const FALLBACK_SERVERS: [&str; 2] = ["1.1.1.1", "8.8.8.8"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// `ip` or `ip:port` entries; empty means the system resolver configuration
    #[serde(default)]
    pub upstream_servers: Vec<String>,
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_ms: u64,
    /// Upper bound on CNAME hops followed from one name
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

// Default functions
fn default_upstream_timeout() -> u64 {
    3000
}
fn default_max_redirects() -> usize {
    16
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            upstream_servers: Vec::new(),
            upstream_timeout_ms: default_upstream_timeout(),
            max_redirects: default_max_redirects(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dns_config() {
        let config = DnsConfig::default();
        assert_eq!(config.upstream_timeout_ms, 3000);
        assert_eq!(config.max_redirects, 16);
        assert!(config.upstream_servers.is_empty());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "upstream_servers": ["9.9.9.9", "[2620:fe::fe]:5353"] }"#;
        let config: DnsConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.upstream_servers.len(), 2);
        assert_eq!(config.upstream_timeout_ms, 3000);
        assert_eq!(config.max_redirects, 16);
    }
}
