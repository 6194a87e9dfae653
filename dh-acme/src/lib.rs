//! DNS-01 challenge records on DreamHost DNS
//!
//! Resolves where the `_acme-challenge` TXT record has to live (wildcards,
//! CNAME/DNAME delegation, public-suffix-aware zone split), creates it
//! through the provider API and removes it again once validation is done.

mod authenticator;
pub mod dreamhost;
pub mod provider;
pub mod resolver;
mod tracker;
pub mod types;

pub use authenticator::Authenticator;
pub use dreamhost::{DnsRecordEntry, DreamHostClient};
pub use provider::DnsProvider;
pub use resolver::{ACME_CHALLENGE_LABEL, DomainResolver, ZoneSplit, challenge_name, split_zone};
pub use tracker::ChallengeRecords;
pub use types::{
    AuthenticatorConfig, ChallengeError, ChallengeRecord, ChallengeResult, ProviderError,
    RecordNotFoundReason,
};

/// One-line description shown by the CLI
pub const DESCRIPTION: &str = "Obtain certificates using a DNS TXT record for DreamHost domains";
