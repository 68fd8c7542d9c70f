//! Learning which suggestion shapes the user keeps dismissing.
//!
//! Every dismissal records a pattern keyed by kind, normalized flagged text,
//! and a token fingerprint of the surrounding context. Reappearing patterns
//! get their confidence discounted on a fixed ladder, with an extra penalty
//! when the current context looks like one that was already ignored.
//! Suggestions that fall below the publish floor are suppressed outright
//! rather than shown and immediately re-ignored.

use std::collections::{BTreeSet, HashMap};

use redpen_core::{OutcomeRecord, Suggestion, SuggestionKind};
use tracing::debug;

/// Confidence floor below which an adjusted suggestion is not published.
pub const PUBLISH_FLOOR: i32 = 20;

const PENALTY_ONE: i32 = 20;
const PENALTY_THREE: i32 = 35;
const PENALTY_FIVE: i32 = 50;
const CONTEXT_PENALTY: i32 = 15;
const CONTEXT_SIMILARITY: f64 = 0.5;

/// One remembered dismissal shape.
#[derive(Debug, Clone)]
struct IgnoredPattern {
    context_tokens: BTreeSet<String>,
    ignore_count: u32,
}

/// Tracks dismissed suggestion patterns and discounts their reappearance.
#[derive(Debug, Default)]
pub struct IgnoreLearner {
    patterns: HashMap<(SuggestionKind, String), Vec<IgnoredPattern>>,
}

impl IgnoreLearner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the learner from records loaded out of the history store.
    pub fn load(&mut self, records: &[OutcomeRecord]) {
        for record in records {
            if !record.accepted {
                self.note_ignored(record.kind, &record.text, &record.context);
            }
        }
        debug!(patterns = self.patterns.len(), "ignore learner seeded");
    }

    /// Record the outcome of a user decision on `flagged` text. Accepted
    /// suggestions carry no penalty; dismissals create or reinforce a
    /// pattern.
    pub fn record_outcome(
        &mut self,
        suggestion: &Suggestion,
        accepted: bool,
        flagged: &str,
        context: &str,
    ) {
        if accepted {
            return;
        }
        self.note_ignored(suggestion.kind, flagged, context);
    }

    /// Confidence after ignore-pattern discounting; may go below zero.
    pub fn adjust_confidence(&self, suggestion: &Suggestion, flagged: &str, context: &str) -> i32 {
        let key = (suggestion.kind, normalize(flagged));
        let Some(patterns) = self.patterns.get(&key) else {
            return suggestion.confidence;
        };

        let max_count = patterns.iter().map(|p| p.ignore_count).max().unwrap_or(0);
        let mut penalty = match max_count {
            0 => 0,
            1 | 2 => PENALTY_ONE,
            3 | 4 => PENALTY_THREE,
            _ => PENALTY_FIVE,
        };

        let current = tokenize(context);
        if patterns
            .iter()
            .any(|p| similarity(&current, &p.context_tokens) >= CONTEXT_SIMILARITY)
        {
            penalty += CONTEXT_PENALTY;
        }

        suggestion.confidence - penalty
    }

    /// Whether the suggestion should be dropped before publication.
    pub fn should_suppress(&self, suggestion: &Suggestion, flagged: &str, context: &str) -> bool {
        self.adjust_confidence(suggestion, flagged, context) < PUBLISH_FLOOR
    }

    /// Apply discounting to a batch against the current document text,
    /// dropping suppressed suggestions.
    pub fn filter(&self, suggestions: Vec<Suggestion>, text: &str) -> Vec<Suggestion> {
        suggestions
            .into_iter()
            .filter_map(|mut s| {
                let flagged = slice(text, s.offset, s.end());
                let context = slice(text, s.offset.saturating_sub(40), s.end() + 40);
                let adjusted = self.adjust_confidence(&s, &flagged, &context);
                if adjusted < PUBLISH_FLOOR {
                    debug!(id = %s.id, adjusted, "suppressing persistently ignored suggestion");
                    None
                } else {
                    s.confidence = adjusted;
                    Some(s)
                }
            })
            .collect()
    }

    fn note_ignored(&mut self, kind: SuggestionKind, text: &str, context: &str) {
        let tokens = tokenize(context);
        let entry = self.patterns.entry((kind, normalize(text))).or_default();
        match entry
            .iter_mut()
            .find(|p| similarity(&tokens, &p.context_tokens) >= CONTEXT_SIMILARITY)
        {
            Some(pattern) => pattern.ignore_count += 1,
            None => entry.push(IgnoredPattern { context_tokens: tokens, ignore_count: 1 }),
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn tokenize(context: &str) -> BTreeSet<String> {
    context
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Token overlap relative to the larger set, in `[0, 1]`.
fn similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / larger as f64
}

/// Char-indexed slice clamped to the document bounds.
fn slice(text: &str, start: usize, end: usize) -> String {
    text.chars().skip(start).take(end.saturating_sub(start)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use redpen_core::{Origin, Severity};

    fn spelling(confidence: i32) -> Suggestion {
        Suggestion {
            id: "s".into(),
            kind: SuggestionKind::Spelling,
            message: "Possible spelling mistake".into(),
            explanation: String::new(),
            replacements: vec!["the".into()],
            offset: 4,
            length: 3,
            source_context: "and teh cat".into(),
            severity: Severity::Medium,
            confidence,
            origin: Origin::Remote,
        }
    }

    fn dismissed(learner: &mut IgnoreLearner, times: u32, context: &str) {
        let s = spelling(90);
        for _ in 0..times {
            learner.record_outcome(&s, false, "teh", context);
        }
    }

    #[test]
    fn unknown_pattern_keeps_confidence() {
        let learner = IgnoreLearner::new();
        assert_eq!(
            learner.adjust_confidence(&spelling(90), "teh", "some context"),
            90
        );
    }

    #[test]
    fn penalty_ladder() {
        // Unrelated contexts so only the count penalty applies.
        let far_context = "entirely different words here";
        let mut learner = IgnoreLearner::new();
        dismissed(&mut learner, 1, "and teh cat sat on");
        assert_eq!(learner.adjust_confidence(&spelling(90), "teh", far_context), 70);

        let mut learner = IgnoreLearner::new();
        dismissed(&mut learner, 3, "and teh cat sat on");
        assert_eq!(learner.adjust_confidence(&spelling(90), "teh", far_context), 55);

        let mut learner = IgnoreLearner::new();
        dismissed(&mut learner, 5, "and teh cat sat on");
        assert_eq!(learner.adjust_confidence(&spelling(90), "teh", far_context), 40);
    }

    #[test]
    fn similar_context_adds_penalty() {
        let mut learner = IgnoreLearner::new();
        dismissed(&mut learner, 1, "and teh cat sat on");
        let adjusted = learner.adjust_confidence(&spelling(90), "teh", "and teh cat sat on");
        assert_eq!(adjusted, 90 - 20 - 15);
    }

    #[test]
    fn suppression_after_five_ignores_in_similar_context() {
        let mut learner = IgnoreLearner::new();
        dismissed(&mut learner, 5, "and teh cat sat on the mat");
        let s = spelling(80);
        let ctx = "and teh cat sat on the mat";
        assert!(learner.adjust_confidence(&s, "teh", ctx) < PUBLISH_FLOOR);
        assert!(learner.should_suppress(&s, "teh", ctx));
    }

    #[test]
    fn accepted_outcomes_carry_no_penalty() {
        let mut learner = IgnoreLearner::new();
        let s = spelling(90);
        learner.record_outcome(&s, true, "teh", "and teh cat");
        assert_eq!(learner.adjust_confidence(&s, "teh", "and teh cat"), 90);
    }

    #[test]
    fn kind_distinguishes_patterns() {
        let mut learner = IgnoreLearner::new();
        dismissed(&mut learner, 5, "and teh cat");
        let mut style = spelling(90);
        style.kind = SuggestionKind::Style;
        assert_eq!(learner.adjust_confidence(&style, "teh", "and teh cat"), 90);
    }

    #[test]
    fn normalization_matches_case_variants() {
        let mut learner = IgnoreLearner::new();
        dismissed(&mut learner, 1, "ctx words here");
        assert!(learner.adjust_confidence(&spelling(90), "TEH", "other words entirely") < 90);
    }

    #[test]
    fn seeded_from_history_records() {
        let mut learner = IgnoreLearner::new();
        let record = OutcomeRecord {
            kind: SuggestionKind::Spelling,
            text: "teh".into(),
            context: "and teh cat sat".into(),
            accepted: false,
            recorded_at: "2026-03-01T09:30:00Z".parse().unwrap(),
        };
        learner.load(&[record.clone(), record.clone(), record]);
        assert_eq!(
            learner.adjust_confidence(&spelling(90), "teh", "unrelated words completely"),
            90 - PENALTY_THREE
        );
    }

    #[test]
    fn filter_drops_suppressed_and_keeps_rest() {
        let mut learner = IgnoreLearner::new();
        let text = "and teh cat sat on the mat";
        dismissed(&mut learner, 5, text);
        let mut fresh = spelling(85);
        fresh.offset = 23;
        let out = learner.filter(vec![spelling(80), fresh], text);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].offset, 23, "the 'mat' suggestion survives");
    }

    #[test]
    fn filter_rewrites_adjusted_confidence() {
        let mut learner = IgnoreLearner::new();
        let text = "some completely different passage with teh inside";
        dismissed(&mut learner, 1, "no shared tokens at all");
        let mut s = spelling(90);
        s.offset = text.find("teh").unwrap();
        let out = learner.filter(vec![s], text);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 70);
    }
}
