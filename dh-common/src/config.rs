use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default wait before the CA is asked to validate; matches the DreamHost minimum TTL
pub const DEFAULT_PROPAGATION_SECONDS: u64 = 600;

/// Configuration loaded from environment variables (and an optional .env file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvConfig {
    /// DreamHost API key given directly; wins over the credentials file
    pub dreamhost_api_key: Option<String>,
    /// Credentials file holding the API key
    pub credentials_path: Option<PathBuf>,
    /// DreamHost API endpoint
    pub dreamhost_api_url: String,
    pub http_timeout_secs: u64,
    /// How long the host waits for propagation before validation
    pub propagation_seconds: u64,
    /// Below this wait a warning is logged
    pub min_propagation_seconds: u64,
    /// Resolvers used for CNAME chasing (None: system resolver configuration)
    pub dns_upstream_servers: Option<Vec<String>>,
    pub dns_upstream_timeout_ms: u64,
    pub dns_max_redirects: usize,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            dreamhost_api_key: None,
            credentials_path: None,
            dreamhost_api_url: "https://api.dreamhost.com/".to_string(),
            http_timeout_secs: 30,
            propagation_seconds: DEFAULT_PROPAGATION_SECONDS,
            min_propagation_seconds: DEFAULT_PROPAGATION_SECONDS,
            dns_upstream_servers: None,
            dns_upstream_timeout_ms: 3000,
            dns_max_redirects: 16,
        }
    }
}

impl EnvConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("DREAMHOST_API_KEY").filter(|v| !v.trim().is_empty()) {
            config.dreamhost_api_key = Some(v.trim().to_string());
        }
        if let Some(v) = lookup("DREAMHOST_CREDENTIALS").filter(|v| !v.trim().is_empty()) {
            config.credentials_path = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = lookup("DREAMHOST_API_URL") {
            config.dreamhost_api_url = v;
        }
        if let Some(v) = lookup("DREAMHOST_HTTP_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                config.http_timeout_secs = secs;
            }
        }
        if let Some(v) = lookup("PROPAGATION_SECONDS") {
            if let Ok(secs) = v.parse() {
                config.propagation_seconds = secs;
            }
        }
        if let Some(v) = lookup("MIN_PROPAGATION_SECONDS") {
            if let Ok(secs) = v.parse() {
                config.min_propagation_seconds = secs;
            }
        }
        if let Some(v) = lookup("DNS_UPSTREAM_SERVERS") {
            let servers: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !servers.is_empty() {
                config.dns_upstream_servers = Some(servers);
            }
        }
        if let Some(v) = lookup("DNS_UPSTREAM_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() {
                config.dns_upstream_timeout_ms = ms;
            }
        }
        if let Some(v) = lookup("DNS_MAX_REDIRECTS") {
            if let Ok(n) = v.parse() {
                config.dns_max_redirects = n;
            }
        }

        config
    }

    /// Load the .env file, then the environment variables.
    ///
    /// Sets process environment variables, so call it before any other thread starts.
    pub fn load(env_file: Option<&Path>) -> Self {
        if let Some(path) = env_file {
            load_dotenv(path);
        } else {
            let candidates = [
                PathBuf::from("/etc/dreamhost-dns01/.env"),
                PathBuf::from(".env"),
            ];
            for candidate in &candidates {
                if candidate.exists() {
                    load_dotenv(candidate);
                    break;
                }
            }
        }

        Self::from_env()
    }
}

/// Basic .env loader (KEY=VALUE per line); variables already set are kept
fn load_dotenv(path: &Path) {
    if let Ok(content) = std::fs::read_to_string(path) {
        for (key, value) in parse_key_values(&content) {
            if std::env::var(&key).is_err() {
                // SAFETY: `EnvConfig::load` runs before any other thread exists
                unsafe { std::env::set_var(&key, &value) };
            }
        }
    }
}

/// KEY=VALUE pairs from .env / INI-like content.
/// Blank lines, `#`/`;` comments and `[section]` headers are skipped.
pub fn parse_key_values(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !line.starts_with('#') && !line.starts_with(';') && !line.starts_with('[')
        })
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
