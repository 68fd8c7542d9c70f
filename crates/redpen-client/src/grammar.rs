//! HTTP client for the remote grammar/style service.

use redpen_core::CheckError;
use redpen_engine::{CheckRequest, CheckResponse, GrammarService};
use tracing::debug;

use crate::transport::{ClientConfig, build_http, status_error, transport_error};

/// Request/response client for `POST {base}/v1/check`.
pub struct GrammarClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl GrammarClient {
    pub fn new(config: ClientConfig) -> Result<Self, CheckError> {
        Ok(Self { client: build_http(&config)?, config })
    }
}

impl GrammarService for GrammarClient {
    async fn check(&self, request: &CheckRequest) -> Result<CheckResponse, CheckError> {
        let url = format!("{}/v1/check", self.config.base_url);
        debug!(url = %url, text_len = request.text.chars().count(), "grammar check request");

        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder.send().await.map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        let response: CheckResponse = resp
            .json()
            .await
            .map_err(|e| CheckError::Network(e.to_string()))?;
        debug!(suggestions = response.suggestions.len(), "grammar check response");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redpen_core::ChangeRegion;

    #[test]
    fn request_wire_shape() {
        let request = CheckRequest {
            text: "The quick brown fox.".into(),
            language: "en".into(),
            changed_ranges: Some(vec![ChangeRegion { start: 4, end: 9, paragraph_index: 0 }]),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["language"], "en");
        assert_eq!(json["changedRanges"][0]["start"], 4);
        assert_eq!(json["changedRanges"][0]["paragraphIndex"], 0);
    }

    #[test]
    fn response_tolerates_missing_api_status() {
        let response: CheckResponse = serde_json::from_str(r#"{"suggestions":[]}"#).unwrap();
        assert!(response.suggestions.is_empty());
        assert!(response.api_status.is_none());
    }
}
