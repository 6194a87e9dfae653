//! Canonical-name chasing.
//!
//! Follows CNAME redirections from a name until reaching one that is not
//! redirected any further. DNAME is covered by the CNAME servers synthesize
//! for names below a DNAME owner. "No such name" and "no data" answers are
//! ordinary outcomes here and come back as [`CanonicalName::Unresolved`];
//! only transport and server failures are errors.

use std::collections::HashSet;
use std::sync::Arc;

use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::RecordType;
use thiserror::Error;
use tracing::debug;

use crate::config::DnsConfig;
use crate::lookup::{DnsLookup, HickoryLookup, LookupFailure, LookupOutcome, LookupRecord, RecordData};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("DNS query for {name} failed: {source}")]
    Transport {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("DNS server returned {rcode} for {name}")]
    ServerFailure { name: String, rcode: ResponseCode },

    #[error("Invalid DNS name {name}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("CNAME loop detected at {name}")]
    RedirectLoop { name: String },

    #[error("More than {limit} CNAME redirections starting from {name}")]
    TooManyRedirects { name: String, limit: usize },
}

impl ResolveError {
    /// Whether asking again later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::ServerFailure { rcode, .. } => *rcode == ResponseCode::ServFail,
            _ => false,
        }
    }

    fn from_lookup(name: &str, failure: LookupFailure) -> Self {
        let name = name.to_string();
        match failure {
            LookupFailure::Transport(source) => Self::Transport { name, source },
            LookupFailure::ServerFailure(rcode) => Self::ServerFailure { name, rcode },
            LookupFailure::InvalidName(reason) => Self::InvalidName { name, reason },
        }
    }
}

/// Why chasing stopped without reaching a name that holds data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    /// The name exists but has no record of the queried type
    NoAnswer,
    /// The name does not exist
    NxDomain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalName {
    /// The chain ended on a name that holds data
    Resolved(String),
    /// The chain ended on NODATA or NXDOMAIN; `name` is the last name reached
    Unresolved { name: String, reason: Unresolved },
}

impl CanonicalName {
    pub fn name(&self) -> &str {
        match self {
            Self::Resolved(name) | Self::Unresolved { name, .. } => name,
        }
    }
}

/// Lowercase, without the trailing root dot
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

pub struct CanonicalResolver {
    lookup: Arc<dyn DnsLookup>,
    max_redirects: usize,
}

/// Redirection bookkeeping for one `canonical_name` call
struct Chase {
    start: String,
    current: String,
    seen: HashSet<String>,
    hops: usize,
    limit: usize,
}

impl Chase {
    fn new(start: String, limit: usize) -> Self {
        Self {
            current: start.clone(),
            seen: HashSet::from([start.clone()]),
            start,
            hops: 0,
            limit,
        }
    }

    fn follow(&mut self, target: String) -> Result<(), ResolveError> {
        self.hops += 1;
        if self.hops > self.limit {
            return Err(ResolveError::TooManyRedirects {
                name: self.start.clone(),
                limit: self.limit,
            });
        }
        if !self.seen.insert(target.clone()) {
            return Err(ResolveError::RedirectLoop { name: target });
        }
        debug!(from = %self.current, to = %target, "Following CNAME");
        self.current = target;
        Ok(())
    }

    /// Walk the CNAME chain present in `records` from the current name
    fn follow_records(&mut self, records: &[LookupRecord]) -> Result<(), ResolveError> {
        while let Some(target) = cname_target(&self.current, records) {
            self.follow(target)?;
        }
        Ok(())
    }
}

impl CanonicalResolver {
    pub fn new(lookup: Arc<dyn DnsLookup>, max_redirects: usize) -> Self {
        Self { lookup, max_redirects }
    }

    /// Resolver talking to the configured upstream servers
    pub fn from_config(config: &DnsConfig) -> Self {
        Self::new(Arc::new(HickoryLookup::from_config(config)), config.max_redirects)
    }

    /// Follow redirections from `name` until they run out.
    ///
    /// TXT is the queried type since that is the record that will be placed
    /// at the final name. The resolver chases CNAMEs itself and reports the
    /// chain with a positive answer, but a negative answer drops the chain,
    /// so each step is then retraced with a CNAME query to find the last
    /// name reached.
    pub async fn canonical_name(&self, name: &str) -> Result<CanonicalName, ResolveError> {
        let mut chase = Chase::new(normalize_name(name), self.max_redirects);

        loop {
            let asked = chase.current.clone();
            match self.query(&asked, RecordType::TXT).await? {
                LookupOutcome::Records(records) => {
                    chase.follow_records(&records)?;
                    if has_data(&chase.current, &records) {
                        return Ok(CanonicalName::Resolved(chase.current));
                    }
                    if chase.current == asked {
                        return Ok(unresolved(chase.current, false));
                    }
                    // Chain stopped on a name without data; ask again from there
                }
                LookupOutcome::NoRecords { nx_domain } => {
                    match self.query(&asked, RecordType::CNAME).await? {
                        LookupOutcome::Records(records) if cname_target(&asked, &records).is_some() => {
                            chase.follow_records(&records)?;
                        }
                        _ => return Ok(unresolved(chase.current, nx_domain)),
                    }
                }
            }
        }
    }

    async fn query(&self, name: &str, record_type: RecordType) -> Result<LookupOutcome, ResolveError> {
        self.lookup
            .lookup(name, record_type)
            .await
            .map_err(|failure| ResolveError::from_lookup(name, failure))
    }
}

fn unresolved(name: String, nx_domain: bool) -> CanonicalName {
    let reason = if nx_domain { Unresolved::NxDomain } else { Unresolved::NoAnswer };
    debug!(name = %name, ?reason, "No further redirection, treating as canonical");
    CanonicalName::Unresolved { name, reason }
}

fn cname_target(name: &str, records: &[LookupRecord]) -> Option<String> {
    records.iter().find_map(|record| match &record.data {
        RecordData::Cname(target) if record.name == name => Some(target.clone()),
        _ => None,
    })
}

fn has_data(name: &str, records: &[LookupRecord]) -> bool {
    records
        .iter()
        .any(|record| record.name == name && !matches!(record.data, RecordData::Cname(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDns;

    fn setup(dns: FakeDns) -> (CanonicalResolver, Arc<FakeDns>) {
        let dns = Arc::new(dns);
        (CanonicalResolver::new(dns.clone(), 16), dns)
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("_ACME-Challenge.Example.COM."), "_acme-challenge.example.com");
        assert_eq!(normalize_name("example.com"), "example.com");
    }

    #[tokio::test]
    async fn test_no_redirection_nxdomain_falls_back_to_queried_name() {
        let (resolver, dns) = setup(FakeDns::new());
        let result = resolver.canonical_name("_acme-challenge.example.com.").await.unwrap();
        assert_eq!(
            result,
            CanonicalName::Unresolved {
                name: "_acme-challenge.example.com".into(),
                reason: Unresolved::NxDomain,
            }
        );
        assert_eq!(
            dns.queries(),
            vec![
                ("_acme-challenge.example.com".to_string(), RecordType::TXT),
                ("_acme-challenge.example.com".to_string(), RecordType::CNAME),
            ]
        );
    }

    #[tokio::test]
    async fn test_nodata_is_not_an_error() {
        let (resolver, _) = setup(FakeDns::new().empty("_acme-challenge.example.com"));
        let result = resolver.canonical_name("_acme-challenge.example.com").await.unwrap();
        assert_eq!(
            result,
            CanonicalName::Unresolved {
                name: "_acme-challenge.example.com".into(),
                reason: Unresolved::NoAnswer,
            }
        );
    }

    #[tokio::test]
    async fn test_existing_txt_resolves_to_itself() {
        let (resolver, _) = setup(FakeDns::new().txt("_acme-challenge.example.com", "old"));
        let result = resolver.canonical_name("_acme-challenge.example.com").await.unwrap();
        assert_eq!(result, CanonicalName::Resolved("_acme-challenge.example.com".into()));
    }

    #[tokio::test]
    async fn test_cname_chain_in_single_answer() {
        let (resolver, dns) = setup(
            FakeDns::new()
                .cname("_acme-challenge.example.com", "hop.example.net")
                .cname("hop.example.net", "_acme-challenge.validation.example.org")
                .txt("_acme-challenge.validation.example.org", "x"),
        );
        let result = resolver.canonical_name("_acme-challenge.example.com").await.unwrap();
        assert_eq!(
            result,
            CanonicalName::Resolved("_acme-challenge.validation.example.org".into())
        );
        assert_eq!(dns.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_chain_ending_in_nodata() {
        let (resolver, _) = setup(
            FakeDns::new()
                .cname("_acme-challenge.example.com", "_acme-challenge.example.net")
                .cname("_acme-challenge.example.net", "acme.example.org")
                .empty("acme.example.org"),
        );
        let result = resolver.canonical_name("_acme-challenge.example.com").await.unwrap();
        assert_eq!(
            result,
            CanonicalName::Unresolved {
                name: "acme.example.org".into(),
                reason: Unresolved::NoAnswer,
            }
        );
    }

    #[tokio::test]
    async fn test_nxdomain_keeps_last_name_reached() {
        let (resolver, _) = setup(FakeDns::new().cname("_acme-challenge.example.com", "gone.example.net"));
        let result = resolver.canonical_name("_acme-challenge.example.com").await.unwrap();
        assert_eq!(
            result,
            CanonicalName::Unresolved {
                name: "gone.example.net".into(),
                reason: Unresolved::NxDomain,
            }
        );
    }

    #[tokio::test]
    async fn test_dname_synthesized_cname() {
        let (resolver, _) = setup(
            FakeDns::new()
                .dname("example.com", "example.net")
                .empty("_acme-challenge.www.example.net"),
        );
        let result = resolver.canonical_name("_acme-challenge.www.example.com").await.unwrap();
        assert_eq!(result.name(), "_acme-challenge.www.example.net");
    }

    #[tokio::test]
    async fn test_redirect_loop_is_an_error() {
        let (resolver, _) = setup(
            FakeDns::new()
                .cname("a.example.com", "b.example.com")
                .cname("b.example.com", "a.example.com"),
        );
        let err = resolver.canonical_name("a.example.com").await.unwrap_err();
        assert!(matches!(err, ResolveError::RedirectLoop { ref name } if name == "a.example.com"));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_too_many_redirects() {
        let mut dns = FakeDns::new();
        for i in 0..5 {
            dns = dns.cname(&format!("n{}.example.com", i), &format!("n{}.example.com", i + 1));
        }
        let resolver = CanonicalResolver::new(Arc::new(dns), 3);
        let err = resolver.canonical_name("n0.example.com").await.unwrap_err();
        assert!(matches!(err, ResolveError::TooManyRedirects { limit: 3, .. }));
    }

    #[tokio::test]
    async fn test_server_failure_propagates() {
        let (resolver, _) = setup(FakeDns::new().rcode("example.com", ResponseCode::ServFail));
        let err = resolver.canonical_name("example.com").await.unwrap_err();
        assert!(matches!(err, ResolveError::ServerFailure { rcode: ResponseCode::ServFail, .. }));
        assert!(err.is_transient());

        let (resolver, _) = setup(FakeDns::new().rcode("example.com", ResponseCode::Refused));
        let err = resolver.canonical_name("example.com").await.unwrap_err();
        assert!(matches!(err, ResolveError::ServerFailure { rcode: ResponseCode::Refused, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let (resolver, _) = setup(FakeDns::new().fail("example.com", "timed out"));
        let err = resolver.canonical_name("example.com").await.unwrap_err();
        assert!(matches!(err, ResolveError::Transport { .. }));
        assert!(err.is_transient());
        assert!(err.to_string().contains("example.com"));
    }
}
