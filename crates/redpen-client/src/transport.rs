//! Shared request plumbing: endpoint config and error mapping.

use std::time::Duration;

use redpen_core::CheckError;

/// Connection settings shared by all service clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Like `https://api.example.com` (no trailing slash).
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Build the shared reqwest client for a config.
pub(crate) fn build_http(config: &ClientConfig) -> Result<reqwest::Client, CheckError> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| CheckError::Network(e.to_string()))
}

/// Map a non-success HTTP status onto the error taxonomy.
pub(crate) fn status_error(status: u16, body: String) -> CheckError {
    match status {
        401 => CheckError::AuthRequired,
        403 => CheckError::Forbidden,
        404 => CheckError::NotFound,
        408 => CheckError::Timeout,
        429 => CheckError::RateLimited,
        _ => CheckError::ServerError { status, body },
    }
}

/// Map a transport-level failure onto the error taxonomy.
pub(crate) fn transport_error(err: reqwest::Error) -> CheckError {
    if err.is_timeout() {
        CheckError::Timeout
    } else {
        CheckError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_trims_trailing_slash() {
        let config = ClientConfig::new("https://api.example.com/");
        assert_eq!(config.base_url, "https://api.example.com");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(status_error(401, String::new()), CheckError::AuthRequired);
        assert_eq!(status_error(403, String::new()), CheckError::Forbidden);
        assert_eq!(status_error(404, String::new()), CheckError::NotFound);
        assert_eq!(status_error(408, String::new()), CheckError::Timeout);
        assert_eq!(status_error(429, String::new()), CheckError::RateLimited);
        assert_eq!(
            status_error(503, "down".into()),
            CheckError::ServerError { status: 503, body: "down".into() }
        );
    }
}
