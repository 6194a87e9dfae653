use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::ChallengeRecord;

/// In-flight challenge records keyed by validation value.
///
/// Cloning shares the same map. Only map mutations take the lock; callers
/// never hold it across provider or DNS calls.
#[derive(Clone, Default)]
pub struct ChallengeRecords {
    inner: Arc<RwLock<HashMap<String, ChallengeRecord>>>,
}

impl ChallengeRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a record, returning the one it replaced for the same validation value
    pub async fn insert(&self, record: ChallengeRecord) -> Option<ChallengeRecord> {
        self.inner
            .write()
            .await
            .insert(record.validation.clone(), record)
    }

    /// Stop tracking and return the record for `validation`
    pub async fn take(&self, validation: &str) -> Option<ChallengeRecord> {
        self.inner.write().await.remove(validation)
    }

    pub async fn get(&self, validation: &str) -> Option<ChallengeRecord> {
        self.inner.read().await.get(validation).cloned()
    }

    /// Every tracked record, in no particular order
    pub async fn snapshot(&self) -> Vec<ChallengeRecord> {
        self.inner.read().await.values().cloned().collect()
    }
}
