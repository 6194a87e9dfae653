use std::fmt;

use dh_dns::ResolveError;
use thiserror::Error;

/// DreamHost will not serve a TXT record with a TTL below this many seconds
pub const DREAMHOST_MIN_TTL_SECS: u64 = 600;

/// Settings for the challenge lifecycle
#[derive(Debug, Clone)]
pub struct AuthenticatorConfig {
    /// How long the host waits for propagation before asking the CA to validate
    pub propagation_seconds: u64,
    /// Waits shorter than this only trigger a warning
    pub min_propagation_seconds: u64,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            propagation_seconds: DREAMHOST_MIN_TTL_SECS,
            min_propagation_seconds: DREAMHOST_MIN_TTL_SECS,
        }
    }
}

impl AuthenticatorConfig {
    pub fn propagation_is_short(&self) -> bool {
        self.propagation_seconds < self.min_propagation_seconds
    }
}

/// One outstanding DNS-01 TXT record, keyed by its validation value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRecord {
    pub validation: String,
    /// Handle returned by the provider on creation, if it issues one
    pub record_id: Option<String>,
    /// Registrable domain the record was created under
    pub zone: String,
    /// Label(s) relative to `zone`; empty at the apex
    pub relative_name: String,
}

impl ChallengeRecord {
    pub fn record_name(&self) -> String {
        join_record_name(&self.relative_name, &self.zone)
    }
}

/// `relative.zone`, or just `zone` when `relative` is empty
pub fn join_record_name(relative: &str, zone: &str) -> String {
    if relative.is_empty() {
        zone.to_string()
    } else {
        format!("{}.{}", relative, zone)
    }
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider API returned HTTP {status}")]
    Status { status: u16 },

    #[error("Provider API error: {code}")]
    Api { code: String },

    #[error("Invalid provider API response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the same call could succeed if tried again later
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status } => *status == 429 || *status >= 500,
            Self::Api { code } => {
                code.contains("slow_down") || code.contains("try_again") || code.contains("internal_error")
            }
            Self::InvalidResponse(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordNotFoundReason {
    /// Cleanup arrived without a matching perform
    NotTracked,
    /// The provider reported nothing was deleted
    NotDeleted,
}

impl fmt::Display for RecordNotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotTracked => write!(f, "was never created by this authenticator"),
            Self::NotDeleted => write!(f, "was not deleted"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ChallengeError {
    #[error("DNS resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    #[error("DNS provider error for {domain}: {source}")]
    Provider {
        domain: String,
        #[source]
        source: ProviderError,
    },

    #[error("TXT record for domain {domain} {reason}")]
    RecordNotFound {
        domain: String,
        reason: RecordNotFoundReason,
    },

    #[error("Invalid domain {domain}: {reason}")]
    InvalidDomain { domain: String, reason: String },
}

impl ChallengeError {
    /// Transport-level failures the host may retry; rejections are terminal
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Resolution(e) => e.is_transient(),
            Self::Provider { source, .. } => source.is_transient(),
            Self::RecordNotFound { .. } | Self::InvalidDomain { .. } => false,
        }
    }
}

pub type ChallengeResult<T> = Result<T, ChallengeError>;
