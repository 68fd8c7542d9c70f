//! Contracts for the external analysis services.
//!
//! The orchestrator treats all three sources as black boxes: a synchronous
//! always-succeeding rule checker, a request/response grammar service, and a
//! generative service with batch and streaming modes. HTTP implementations
//! live in `redpen-client`; tests substitute scripted fakes.

use futures::stream::BoxStream;
use redpen_core::{ChangeRegion, CheckError, CheckOptions, Suggestion};
use serde::{Deserialize, Serialize};

/// Request sent to the remote grammar/style service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub text: String,
    pub language: String,
    /// Present in incremental mode: only these spans need analysis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_ranges: Option<Vec<ChangeRegion>>,
}

/// Response from the remote grammar/style service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub api_status: Option<String>,
}

/// Request sent to the generative suggestion service (batch or streaming).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerativeRequest {
    pub text: String,
    pub document_type: String,
    pub check_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_ranges: Option<Vec<ChangeRegion>>,
}

/// Aggregate numbers reported at the end of a generative run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerativeStats {
    pub suggestion_count: usize,
    #[serde(default)]
    pub model_time_ms: u64,
}

/// Batch response from the generative service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerativeResponse {
    pub success: bool,
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub stats: GenerativeStats,
}

/// One typed frame on the generative streaming channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StreamFrame {
    Start,
    Suggestion {
        suggestion: Suggestion,
        running_count: usize,
    },
    Complete {
        stats: GenerativeStats,
    },
    Error {
        message: String,
    },
}

/// Synchronous rule-based checker. Always succeeds; degrades via its own
/// confidence floor rather than erroring.
pub trait RuleChecker {
    fn check(&self, text: &str, options: &CheckOptions) -> Vec<Suggestion>;
}

/// Remote grammar/style service, request/response.
pub trait GrammarService {
    async fn check(&self, request: &CheckRequest) -> Result<CheckResponse, CheckError>;
}

/// Generative suggestion service: batch and incremental/streaming modes.
pub trait GenerativeService {
    async fn check(&self, request: &GenerativeRequest) -> Result<GenerativeResponse, CheckError>;

    /// Open the streaming channel. The returned stream suspends between
    /// frames; dropping it (or aborting its wrapper) closes the reader.
    async fn open_stream(
        &self,
        request: &GenerativeRequest,
    ) -> Result<BoxStream<'static, Result<StreamFrame, CheckError>>, CheckError>;
}
