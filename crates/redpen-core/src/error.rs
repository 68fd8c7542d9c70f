//! Error taxonomy for analysis requests.

use thiserror::Error;

/// Everything that can go wrong between the orchestrator and a service.
///
/// Only `InvalidInput` ever reaches the caller of a check request; service
/// failures are absorbed by the fallback chain and, at most, surfaced as a
/// degradation notice.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authentication required")]
    AuthRequired,

    #[error("access forbidden")]
    Forbidden,

    #[error("endpoint not found")]
    NotFound,

    #[error("rate limited by service")]
    RateLimited,

    #[error("request timed out")]
    Timeout,

    #[error("server returned {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("service does not support streaming")]
    StreamingUnsupported,

    #[error("circuit open, service cooling down")]
    CircuitOpen,
}

impl CheckError {
    /// Whether the failure is attributable to the service rather than the
    /// caller. Server-side failures feed the circuit breaker.
    pub fn is_server_side(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::ServerError { .. } | Self::Network(_) | Self::RateLimited
        )
    }

    /// The surfaced-but-non-fatal subset: worth a transient UI notice, but
    /// the scheduler keeps trying on the next edit.
    pub fn is_degradation_notice(&self) -> bool {
        matches!(self, Self::RateLimited | Self::AuthRequired | Self::Forbidden)
    }
}
