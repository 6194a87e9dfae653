//! DreamHost DNS API client (https://help.dreamhost.com/hc/en-us/articles/217555707).
//!
//! Every call is a GET against the API root with `key`, `cmd` and
//! `format=json`; replies look like `{"result": "success"|"error", "data": ...}`.

use std::time::Duration;

use async_trait::async_trait;
use dh_dns::RecordType;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::provider::DnsProvider;
use crate::types::ProviderError;

pub const DREAMHOST_API_BASE: &str = "https://api.dreamhost.com/";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct DreamHostResponse {
    result: String,
    #[serde(default)]
    data: Value,
}

/// One entry of `dns-list_records`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DnsRecordEntry {
    pub zone: String,
    pub record: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub editable: String,
}

pub struct DreamHostClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl DreamHostClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_base_url(DREAMHOST_API_BASE, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Http(e.without_url()))?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Run one API command and return its `data` on success.
    /// Mutating commands carry a fresh `unique_id` so DreamHost never applies them twice.
    async fn call(&self, cmd: &str, params: &[(&str, &str)], mutating: bool) -> Result<Value, ProviderError> {
        let unique_id = uuid::Uuid::new_v4().to_string();
        let mut query: Vec<(&str, &str)> = vec![("key", self.api_key.as_str()), ("cmd", cmd), ("format", "json")];
        if mutating {
            query.push(("unique_id", unique_id.as_str()));
        }
        query.extend_from_slice(params);

        // The key travels in the query string; keep it out of error messages
        let resp = self
            .http
            .get(&self.api_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(cmd, status = %status, "DreamHost API request failed");
            return Err(ProviderError::Status {
                status: status.as_u16(),
            });
        }

        let body: DreamHostResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.without_url().to_string()))?;

        if body.result != "success" {
            let code = match body.data {
                Value::String(code) => code,
                Value::Null => body.result,
                other => other.to_string(),
            };
            return Err(ProviderError::Api { code });
        }

        Ok(body.data)
    }

    /// All records visible to the API key
    pub async fn list_records(&self) -> Result<Vec<DnsRecordEntry>, ProviderError> {
        let data = self.call("dns-list_records", &[], false).await?;
        serde_json::from_value(data).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl DnsProvider for DreamHostClient {
    fn name(&self) -> &'static str {
        "dreamhost"
    }

    async fn add_record(
        &self,
        name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<Option<String>, ProviderError> {
        let record_type = record_type.to_string();
        debug!(record_name = name, record_type = %record_type, "Creating DreamHost DNS record");

        self.call(
            "dns-add_record",
            &[("record", name), ("type", record_type.as_str()), ("value", value)],
            true,
        )
        .await?;

        info!(record_name = name, record_type = %record_type, "Created DreamHost DNS record");
        // DreamHost identifies records by name, type and value only
        Ok(None)
    }

    async fn remove_record(
        &self,
        name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<bool, ProviderError> {
        let record_type = record_type.to_string();
        debug!(record_name = name, record_type = %record_type, "Removing DreamHost DNS record");

        match self
            .call(
                "dns-remove_record",
                &[("record", name), ("type", record_type.as_str()), ("value", value)],
                true,
            )
            .await
        {
            Ok(_) => {
                info!(record_name = name, record_type = %record_type, "Removed DreamHost DNS record");
                Ok(true)
            }
            Err(ProviderError::Api { code }) if code == "no_such_record" => {
                warn!(record_name = name, record_type = %record_type, "DreamHost has no such record");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
