//! Works out where a DNS-01 TXT record has to be placed.
//!
//! `*.example.com` and `example.com` share `_acme-challenge.example.com`.
//! That name is chased through CNAME/DNAME redirections (challenge
//! delegation), and the final name is split on the public suffix list
//! into the registrable zone and the labels below it.

use dh_dns::{CanonicalName, CanonicalResolver, normalize_name};
use tracing::debug;

use crate::types::{ChallengeError, ChallengeResult, join_record_name};

/// Label every DNS-01 TXT record lives under
pub const ACME_CHALLENGE_LABEL: &str = "_acme-challenge";

/// Where a record goes: the registrable zone and the name relative to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSplit {
    pub zone: String,
    pub relative_name: String,
}

impl ZoneSplit {
    pub fn record_name(&self) -> String {
        join_record_name(&self.relative_name, &self.zone)
    }
}

/// Domain being validated, without any wildcard marker
pub fn base_domain(domain: &str) -> String {
    let domain = normalize_name(domain);
    match domain.strip_prefix("*.") {
        Some(base) => base.to_string(),
        None => domain,
    }
}

/// `_acme-challenge.<domain>` with the wildcard stripped
pub fn challenge_name(domain: &str) -> String {
    format!("{}.{}", ACME_CHALLENGE_LABEL, base_domain(domain))
}

/// Split a fully qualified name into registrable zone and relative labels
pub fn split_zone(fqdn: &str) -> ChallengeResult<ZoneSplit> {
    let name = normalize_name(fqdn);

    let zone = psl::domain_str(&name).ok_or_else(|| ChallengeError::InvalidDomain {
        domain: name.clone(),
        reason: "no registrable domain below a public suffix".into(),
    })?;

    let relative_name = name
        .strip_suffix(zone)
        .map(|rest| rest.trim_end_matches('.'))
        .unwrap_or_default()
        .to_string();

    Ok(ZoneSplit {
        zone: zone.to_string(),
        relative_name,
    })
}

pub struct DomainResolver {
    canonical: CanonicalResolver,
}

impl DomainResolver {
    pub fn new(canonical: CanonicalResolver) -> Self {
        Self { canonical }
    }

    /// Zone and relative name for the challenge record of `domain`
    pub async fn resolve(&self, domain: &str) -> ChallengeResult<ZoneSplit> {
        let base = base_domain(domain);
        if base.is_empty() || base.contains('*') {
            return Err(ChallengeError::InvalidDomain {
                domain: domain.to_string(),
                reason: "not a domain name".into(),
            });
        }

        self.resolve_name(&challenge_name(&base)).await
    }

    /// Zone and relative name for an already prefixed challenge name
    pub async fn resolve_name(&self, fqdn: &str) -> ChallengeResult<ZoneSplit> {
        let canonical = self.canonical.canonical_name(fqdn).await?;
        match &canonical {
            CanonicalName::Resolved(name) => {
                debug!(requested = fqdn, canonical = %name, "Challenge name resolved");
            }
            CanonicalName::Unresolved { name, reason } => {
                debug!(requested = fqdn, canonical = %name, ?reason, "Challenge name has no further redirection");
            }
        }

        let split = split_zone(canonical.name())?;
        debug!(zone = %split.zone, relative_name = %split.relative_name, "Challenge record placement");
        Ok(split)
    }
}
