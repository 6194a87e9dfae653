use std::sync::Arc;

use dh_dns::RecordType;
use tracing::{debug, error, info, warn};

use crate::provider::DnsProvider;
use crate::resolver::{DomainResolver, challenge_name};
use crate::tracker::ChallengeRecords;
use crate::types::{
    AuthenticatorConfig, ChallengeError, ChallengeRecord, ChallengeResult, RecordNotFoundReason,
};

/// Drives the DNS-01 record lifecycle: place the TXT record, then remove it.
///
/// Each call only blocks on its own DNS and provider requests; the record
/// map is locked just long enough to insert or remove one entry, so calls
/// for different domains run concurrently. Dropping a call's future cancels
/// it, which lets the host bound latency with `tokio::time::timeout`.
pub struct Authenticator {
    config: AuthenticatorConfig,
    resolver: DomainResolver,
    provider: Arc<dyn DnsProvider>,
    records: ChallengeRecords,
}

impl Authenticator {
    pub fn new(
        config: AuthenticatorConfig,
        resolver: DomainResolver,
        provider: Arc<dyn DnsProvider>,
        records: ChallengeRecords,
    ) -> Self {
        Self {
            config,
            resolver,
            provider,
            records,
        }
    }

    pub fn config(&self) -> &AuthenticatorConfig {
        &self.config
    }

    /// Publish the TXT record proving control of `domain`
    pub async fn perform(&self, domain: &str, validation_name: &str, validation: &str) -> ChallengeResult<()> {
        if self.config.propagation_is_short() {
            warn!(
                propagation_seconds = self.config.propagation_seconds,
                min_propagation_seconds = self.config.min_propagation_seconds,
                "The propagation time is less than the {} DNS TTL minimum. Subsequent challenges \
                 for the same domain may fail; increase the propagation time if you encounter issues.",
                self.provider.name()
            );
        }

        if !validation_name.eq_ignore_ascii_case(&challenge_name(domain)) {
            debug!(domain, validation_name, "Validation name differs from the expected challenge name");
        }

        let placement = self.resolver.resolve(domain).await?;
        let record_name = placement.record_name();

        let record_id = self
            .provider
            .add_record(&record_name, RecordType::TXT, validation)
            .await
            .map_err(|source| {
                error!(domain, record_name = %record_name, error = %source, "Failed to create challenge record");
                ChallengeError::Provider {
                    domain: domain.to_string(),
                    source,
                }
            })?;

        let record = ChallengeRecord {
            validation: validation.to_string(),
            record_id,
            zone: placement.zone,
            relative_name: placement.relative_name,
        };

        if let Some(previous) = self.records.insert(record).await {
            warn!(
                domain,
                previous_record = %previous.record_name(),
                "Replaced a tracked challenge record with the same validation value"
            );
        }

        info!(domain, record_name = %record_name, "Challenge TXT record created");
        Ok(())
    }

    /// Remove the TXT record created by [`perform`](Self::perform) for `validation`.
    ///
    /// The tracked entry is dropped even when deletion fails; the error still
    /// reaches the caller so the orphaned record can be removed by hand.
    pub async fn cleanup(&self, domain: &str, validation_name: &str, validation: &str) -> ChallengeResult<()> {
        let record = self.records.take(validation).await.ok_or_else(|| {
            warn!(domain, validation_name, "Cleanup requested for an untracked challenge");
            ChallengeError::RecordNotFound {
                domain: domain.to_string(),
                reason: RecordNotFoundReason::NotTracked,
            }
        })?;
        let record_name = record.record_name();

        let removed = self
            .provider
            .remove_record(&record_name, RecordType::TXT, validation)
            .await
            .map_err(|source| {
                error!(domain, record_name = %record_name, error = %source, "Failed to delete challenge record");
                ChallengeError::Provider {
                    domain: domain.to_string(),
                    source,
                }
            })?;

        if !removed {
            warn!(domain, record_name = %record_name, "Challenge record was not deleted");
            return Err(ChallengeError::RecordNotFound {
                domain: domain.to_string(),
                reason: RecordNotFoundReason::NotDeleted,
            });
        }

        info!(domain, record_name = %record_name, "Challenge TXT record deleted");
        Ok(())
    }

    /// The record currently tracked for `validation`
    pub async fn tracked(&self, validation: &str) -> Option<ChallengeRecord> {
        self.records.get(validation).await
    }

    /// Records created but not yet cleaned up
    pub async fn outstanding(&self) -> Vec<ChallengeRecord> {
        self.records.snapshot().await
    }
}
