//! Finds where an ACME challenge record really lives by chasing CNAME
//! (and server-synthesized DNAME) redirections with a recursive resolver.

pub mod canonical;
pub mod config;
pub mod lookup;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use canonical::{CanonicalName, CanonicalResolver, ResolveError, Unresolved, normalize_name};
pub use config::DnsConfig;
pub use hickory_resolver::proto::rr::RecordType;
pub use lookup::{DnsLookup, HickoryLookup, LookupFailure, LookupOutcome, LookupRecord, RecordData};
