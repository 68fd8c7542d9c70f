//! Ignore-history records exchanged with the history store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::suggestion::SuggestionKind;

/// One accept/ignore decision, as stored by the ignore-history service.
///
/// Read in bulk to seed the ignore-pattern learner at session start; written
/// one at a time (fire-and-forget) as the user acts on suggestions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    pub kind: SuggestionKind,
    /// The flagged text, as it appeared in the document.
    pub text: String,
    /// Surrounding context snippet at decision time.
    pub context: String,
    pub accepted: bool,
    pub recorded_at: DateTime<Utc>,
}
