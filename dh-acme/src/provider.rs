//! Capability surface the challenge lifecycle needs from a DNS host.

use async_trait::async_trait;
use dh_dns::RecordType;

use crate::types::ProviderError;

/// A DNS hosting API able to add and remove individual records.
///
/// Implementations must be safe to call concurrently for different names.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Create `name` with the given type and value.
    /// Returns the provider's handle for the record when it issues one.
    async fn add_record(
        &self,
        name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<Option<String>, ProviderError>;

    /// Remove the record matching name, type and value.
    /// `Ok(false)` means the provider had no such record.
    async fn remove_record(
        &self,
        name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<bool, ProviderError>;
}
