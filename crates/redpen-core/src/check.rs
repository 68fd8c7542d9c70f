//! Check requests: triggers, options, edits, and changed regions.

use serde::{Deserialize, Serialize};

/// What prompted an analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckTrigger {
    /// An ordinary keystroke.
    Typing,
    /// The user completed a sentence (., !, ?).
    SentenceEnd,
    /// The user completed a paragraph (blank line).
    ParagraphEnd,
    /// Typing stopped for a while.
    Pause,
    /// The editor lost focus.
    Blur,
}

/// Per-session analysis options; part of every cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOptions {
    pub language: String,
    /// Suggestions below this confidence are discarded at the source.
    pub min_confidence: i32,
    pub max_suggestions: usize,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            language: "en".into(),
            min_confidence: 30,
            max_suggestions: 100,
        }
    }
}

/// A contiguous span of text that differs from the last-analyzed snapshot.
///
/// Produced by the change detector each cycle, consumed once by the
/// orchestrator, never persisted. Offsets are `char` indices, `end` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRegion {
    pub start: usize,
    pub end: usize,
    pub paragraph_index: usize,
}

impl ChangeRegion {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Classification of a single local edit, for scheduling purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Add,
    Delete,
    Replace,
}

/// A local edit: `removed` chars at `offset` were replaced by `inserted` chars.
///
/// Pure insertion has `removed == 0`; pure deletion has `inserted == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub offset: usize,
    pub removed: usize,
    pub inserted: usize,
}

impl Edit {
    /// Exclusive end of the replaced span in the pre-edit text.
    pub fn end(&self) -> usize {
        self.offset + self.removed
    }

    /// Net change in document length, in chars.
    pub fn delta(&self) -> isize {
        self.inserted as isize - self.removed as isize
    }

    pub fn kind(&self) -> EditKind {
        match (self.removed, self.inserted) {
            (0, _) => EditKind::Add,
            (_, 0) => EditKind::Delete,
            _ => EditKind::Replace,
        }
    }

    /// Number of chars touched, for edit-pattern classification.
    pub fn size(&self) -> usize {
        self.removed.max(self.inserted)
    }
}
