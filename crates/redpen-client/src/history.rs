//! HTTP client for the ignore-history service.

use redpen_core::{CheckError, OutcomeRecord};
use tracing::{debug, warn};

use crate::transport::{ClientConfig, build_http, status_error, transport_error};

/// Client for `GET`/`POST {base}/v1/ignore-history`.
pub struct HistoryClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HistoryClient {
    pub fn new(config: ClientConfig) -> Result<Self, CheckError> {
        Ok(Self { client: build_http(&config)?, config })
    }

    fn url(&self) -> String {
        format!("{}/v1/ignore-history", self.config.base_url)
    }

    /// Load all stored outcome records, for seeding the ignore learner.
    pub async fn load(&self) -> Result<Vec<OutcomeRecord>, CheckError> {
        let url = self.url();
        debug!(url = %url, "loading outcome history");

        let mut builder = self.client.get(&url);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder.send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        let records: Vec<OutcomeRecord> = resp
            .json()
            .await
            .map_err(|e| CheckError::Network(e.to_string()))?;
        debug!(count = records.len(), "outcome history loaded");
        Ok(records)
    }

    /// Persist one outcome, fire-and-forget: failures are logged, never
    /// surfaced, since history is advisory.
    pub async fn record(&self, record: &OutcomeRecord) {
        let mut builder = self.client.post(self.url()).json(record);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        match builder.send().await {
            Ok(resp) if !resp.status().is_success() => {
                warn!(status = resp.status().as_u16(), "history record rejected");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "history record failed to send"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_array_decodes() {
        let json = r#"[{
            "kind": "spelling",
            "text": "teh",
            "context": "and teh cat sat",
            "accepted": false,
            "recordedAt": "2026-03-01T09:30:00Z"
        }]"#;
        let records: Vec<OutcomeRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "teh");
    }
}
