//! In-memory DNS for exercising resolution without a network.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::RecordType;

use crate::canonical::normalize_name;
use crate::lookup::{DnsLookup, LookupFailure, LookupOutcome, LookupRecord};

enum Entry {
    Cname(String),
    Txt(String),
    /// Name exists without data
    Empty,
    Rcode(ResponseCode),
    Fail(String),
}

/// Answers like a recursive resolver over a fixed table of names.
///
/// TXT queries chase CNAMEs and return the chain with the data; a chain
/// ending on a missing or empty name comes back negative without the chain.
/// Names below a DNAME owner get a synthesized CNAME. Unknown names are
/// NXDOMAIN.
#[derive(Default)]
pub struct FakeDns {
    table: HashMap<String, Entry>,
    dnames: Vec<(String, String)>,
    queries: Mutex<Vec<(String, RecordType)>>,
}

const MAX_CHAIN: usize = 32;

impl FakeDns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cname(self, name: &str, target: &str) -> Self {
        self.with(name, Entry::Cname(normalize_name(target)))
    }

    pub fn txt(self, name: &str, text: &str) -> Self {
        self.with(name, Entry::Txt(text.to_string()))
    }

    pub fn empty(self, name: &str) -> Self {
        self.with(name, Entry::Empty)
    }

    pub fn dname(mut self, owner: &str, target: &str) -> Self {
        self.dnames.push((normalize_name(owner), normalize_name(target)));
        self
    }

    /// Answer this name with a failure rcode
    pub fn rcode(self, name: &str, rcode: ResponseCode) -> Self {
        self.with(name, Entry::Rcode(rcode))
    }

    /// Transport-level failure for this name
    pub fn fail(self, name: &str, message: &str) -> Self {
        self.with(name, Entry::Fail(message.to_string()))
    }

    /// Names and types asked so far, in order
    pub fn queries(&self) -> Vec<(String, RecordType)> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn with(mut self, name: &str, entry: Entry) -> Self {
        self.table.insert(normalize_name(name), entry);
        self
    }

    /// CNAME target for `name`, explicit or DNAME-synthesized
    fn redirect(&self, name: &str) -> Option<String> {
        if let Some(Entry::Cname(target)) = self.table.get(name) {
            return Some(target.clone());
        }
        self.dnames.iter().find_map(|(owner, target)| {
            let prefix = name.strip_suffix(owner.as_str())?.strip_suffix('.')?;
            Some(format!("{}.{}", prefix, target))
        })
    }

    fn failure(&self, name: &str) -> Option<LookupFailure> {
        match self.table.get(name)? {
            Entry::Rcode(rcode) => Some(LookupFailure::ServerFailure(*rcode)),
            Entry::Fail(message) => Some(LookupFailure::Transport(anyhow::anyhow!("{}", message))),
            _ => None,
        }
    }
}

#[async_trait]
impl DnsLookup for FakeDns {
    async fn lookup(&self, name: &str, record_type: RecordType) -> Result<LookupOutcome, LookupFailure> {
        let name = normalize_name(name);
        if let Ok(mut queries) = self.queries.lock() {
            queries.push((name.clone(), record_type));
        }
        if let Some(failure) = self.failure(&name) {
            return Err(failure);
        }

        if record_type == RecordType::CNAME {
            return Ok(match self.redirect(&name) {
                Some(target) => LookupOutcome::Records(vec![LookupRecord::cname(&name, &target)]),
                None => LookupOutcome::NoRecords {
                    nx_domain: !self.table.contains_key(&name),
                },
            });
        }

        let mut chain = Vec::new();
        let mut current = name;
        for _ in 0..MAX_CHAIN {
            if let Some(failure) = self.failure(&current) {
                return Err(failure);
            }
            if let Some(target) = self.redirect(&current) {
                chain.push(LookupRecord::cname(&current, &target));
                current = target;
                continue;
            }
            return Ok(match self.table.get(&current) {
                Some(Entry::Txt(text)) => {
                    chain.push(LookupRecord::txt(&current, text));
                    LookupOutcome::Records(chain)
                }
                Some(_) => LookupOutcome::NoRecords { nx_domain: false },
                None => LookupOutcome::NoRecords { nx_domain: true },
            });
        }
        // Looping chain; hand back what was followed
        Ok(LookupOutcome::Records(chain))
    }
}
