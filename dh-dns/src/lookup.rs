//! Single-name DNS lookups behind a small trait.
//!
//! [`HickoryLookup`] is the real implementation. Negative answers come back
//! as [`LookupOutcome::NoRecords`] so callers can branch on them; only
//! transport and server failures are errors.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::{Name, RData, Record, RecordType};
use hickory_resolver::proto::ProtoErrorKind;
use hickory_resolver::{ResolveErrorKind, TokioResolver};
use thiserror::Error;
use tracing::{debug, warn};

use crate::canonical::normalize_name;
use crate::config::{DnsConfig, FALLBACK_SERVERS};

const DNS_PORT: u16 = 53;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    Cname(String),
    Txt(String),
    Other(RecordType),
}

/// One answer record, owner name normalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRecord {
    pub name: String,
    pub data: RecordData,
}

impl LookupRecord {
    pub fn cname(name: &str, target: &str) -> Self {
        Self {
            name: normalize_name(name),
            data: RecordData::Cname(normalize_name(target)),
        }
    }

    pub fn txt(name: &str, text: &str) -> Self {
        Self {
            name: normalize_name(name),
            data: RecordData::Txt(text.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// Answer records, including any CNAME chain the resolver followed
    Records(Vec<LookupRecord>),
    /// NXDOMAIN (`nx_domain`) or NODATA
    NoRecords { nx_domain: bool },
}

#[derive(Error, Debug)]
pub enum LookupFailure {
    #[error("{0}")]
    Transport(anyhow::Error),

    #[error("server answered {0}")]
    ServerFailure(ResponseCode),

    #[error("invalid name: {0}")]
    InvalidName(String),
}

#[async_trait]
pub trait DnsLookup: Send + Sync {
    async fn lookup(&self, name: &str, record_type: RecordType) -> Result<LookupOutcome, LookupFailure>;
}

/// Recursive lookups through hickory's tokio resolver
pub struct HickoryLookup {
    resolver: TokioResolver,
}

impl HickoryLookup {
    pub fn new(resolver: TokioResolver) -> Self {
        Self { resolver }
    }

    /// Resolver for the configured servers, or the system configuration when none are set
    pub fn from_config(config: &DnsConfig) -> Self {
        let mut builder = if config.upstream_servers.is_empty() {
            match TokioResolver::builder_tokio() {
                Ok(builder) => builder,
                Err(e) => {
                    warn!("Cannot read system resolver configuration ({}), using public resolvers", e);
                    let fallback: Vec<String> = FALLBACK_SERVERS.iter().map(|s| s.to_string()).collect();
                    TokioResolver::builder_with_config(
                        resolver_config(&fallback),
                        TokioConnectionProvider::default(),
                    )
                }
            }
        } else {
            TokioResolver::builder_with_config(
                resolver_config(&config.upstream_servers),
                TokioConnectionProvider::default(),
            )
        };

        let opts: &mut ResolverOpts = builder.options_mut();
        opts.timeout = Duration::from_millis(config.upstream_timeout_ms);
        opts.attempts = 2;
        opts.preserve_intermediates = true;

        Self::new(builder.build())
    }
}

#[async_trait]
impl DnsLookup for HickoryLookup {
    async fn lookup(&self, name: &str, record_type: RecordType) -> Result<LookupOutcome, LookupFailure> {
        // Absolute name so search domains never apply; from_ascii keeps `_` labels
        let fqdn = Name::from_ascii(format!("{}.", normalize_name(name)))
            .map_err(|e| LookupFailure::InvalidName(format!("{}: {}", name, e)))?;

        match self.resolver.lookup(fqdn, record_type).await {
            Ok(lookup) => Ok(LookupOutcome::Records(
                lookup.records().iter().map(lookup_record).collect(),
            )),
            Err(e) => classify(e),
        }
    }
}

fn lookup_record(record: &Record) -> LookupRecord {
    let data = match record.data() {
        RData::CNAME(cname) => RecordData::Cname(normalize_name(&cname.0.to_ascii())),
        RData::TXT(txt) => RecordData::Txt(txt.to_string()),
        other => RecordData::Other(other.record_type()),
    };
    LookupRecord {
        name: normalize_name(&record.name().to_ascii()),
        data,
    }
}

/// Negative answers are outcomes; other rcodes and transport errors are failures
fn classify(err: hickory_resolver::ResolveError) -> Result<LookupOutcome, LookupFailure> {
    if let ResolveErrorKind::Proto(proto) = err.kind() {
        if let ProtoErrorKind::NoRecordsFound { response_code, .. } = proto.kind() {
            return match *response_code {
                ResponseCode::NXDomain => Ok(LookupOutcome::NoRecords { nx_domain: true }),
                ResponseCode::NoError => Ok(LookupOutcome::NoRecords { nx_domain: false }),
                code => Err(LookupFailure::ServerFailure(code)),
            };
        }
    }
    debug!(error = %err, "DNS lookup failed");
    Err(LookupFailure::Transport(err.into()))
}

fn resolver_config(servers: &[String]) -> ResolverConfig {
    let mut group = NameServerConfigGroup::new();
    for server in servers {
        match parse_server(server) {
            Some(addr) => group.merge(NameServerConfigGroup::from_ips_clear(&[addr.ip()], addr.port(), true)),
            None => warn!(server = %server, "Ignoring invalid DNS server address"),
        }
    }
    ResolverConfig::from_parts(None, vec![], group)
}

/// `ip` (port 53) or `ip:port` / `[v6]:port`
pub fn parse_server(s: &str) -> Option<SocketAddr> {
    let s = s.trim();
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Some(addr);
    }
    s.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, DNS_PORT))
}
