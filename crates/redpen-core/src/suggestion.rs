//! Suggestion types shared between the engine, the HTTP clients, and the UI.

use serde::{Deserialize, Serialize};

/// Category of a detected issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Grammar,
    Spelling,
    Style,
    Clarity,
    Punctuation,
}

impl SuggestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grammar => "grammar",
            Self::Spelling => "spelling",
            Self::Style => "style",
            Self::Clarity => "clarity",
            Self::Punctuation => "punctuation",
        }
    }
}

/// How urgently the issue should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Which analysis source produced the suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Local rule-based checker.
    Rules,
    /// Remote grammar/style service.
    Remote,
    /// Generative suggestion service (batch or streamed).
    Generative,
}

/// A positional annotation over the current document text.
///
/// `offset` and `length` are measured in `char`s into the *current* document.
/// Once published a suggestion is only mutated by the offset remapper
/// (position shift) or the merger (confidence override); it is destroyed on
/// acceptance, dismissal, or invalidation by an overlapping edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub kind: SuggestionKind,
    pub message: String,
    #[serde(default)]
    pub explanation: String,
    /// Proposed replacement strings, best first.
    pub replacements: Vec<String>,
    pub offset: usize,
    pub length: usize,
    /// Surrounding text snippet captured when the suggestion was produced.
    #[serde(default)]
    pub source_context: String,
    pub severity: Severity,
    /// Nominally 0–100. Signed so ignore-pattern penalties can push it
    /// below zero before the publish floor drops it.
    pub confidence: i32,
    pub origin: Origin,
}

impl Suggestion {
    /// Exclusive end offset of the annotated span.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Whether this suggestion's span overlaps `[start, end)`.
    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.offset < end && self.end() > start
    }

    /// Whether the span lies entirely inside `[start, end)`.
    pub fn contained_in(&self, start: usize, end: usize) -> bool {
        self.offset >= start && self.end() <= end
    }
}
