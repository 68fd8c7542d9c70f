//! Built-in rule-based checker: the always-available local fallback.
//!
//! A domain-bounded table of common misspellings plus a few mechanical
//! checks (doubled words, doubled spaces, space before punctuation). Not a
//! grammar engine; its job is to keep the fallback chain from ever coming
//! up empty-handed.

use std::collections::HashMap;

use redpen_core::{CheckOptions, Origin, Severity, Suggestion, SuggestionKind};

use crate::service::RuleChecker;

/// Common transpositions and misspellings with their corrections.
const MISSPELLINGS: &[(&str, &str)] = &[
    ("teh", "the"),
    ("adn", "and"),
    ("recieve", "receive"),
    ("seperate", "separate"),
    ("definately", "definitely"),
    ("occured", "occurred"),
    ("untill", "until"),
    ("wich", "which"),
    ("becuase", "because"),
    ("alot", "a lot"),
];

const MISSPELLING_CONFIDENCE: i32 = 85;
const DOUBLED_WORD_CONFIDENCE: i32 = 75;
const SPACING_CONFIDENCE: i32 = 70;

/// Table-driven local checker implementing [`RuleChecker`].
pub struct BuiltinRules {
    misspellings: HashMap<&'static str, &'static str>,
}

impl BuiltinRules {
    pub fn new() -> Self {
        Self {
            misspellings: MISSPELLINGS.iter().copied().collect(),
        }
    }
}

impl Default for BuiltinRules {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleChecker for BuiltinRules {
    fn check(&self, text: &str, options: &CheckOptions) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();
        let mut next_id = 0usize;
        let mut id = move || {
            next_id += 1;
            format!("rule-{next_id}")
        };

        let words = split_words(text);
        for (i, word) in words.iter().enumerate() {
            let lower = word.text.to_lowercase();

            if let Some(&correction) = self.misspellings.get(lower.as_str()) {
                suggestions.push(Suggestion {
                    id: id(),
                    kind: SuggestionKind::Spelling,
                    message: format!("\"{}\" may be a misspelling", word.text),
                    explanation: format!("Did you mean \"{correction}\"?"),
                    replacements: vec![match_case(correction, word.text)],
                    offset: word.offset,
                    length: word.len(),
                    source_context: context_around(text, word.offset, word.offset + word.len()),
                    severity: Severity::Medium,
                    confidence: MISSPELLING_CONFIDENCE,
                    origin: Origin::Rules,
                });
            }

            if let Some(prev) = i.checked_sub(1).and_then(|p| words.get(p))
                && !prev.ends_sentence
                && prev.text.to_lowercase() == lower
                && lower.chars().all(|c| c.is_alphabetic())
            {
                suggestions.push(Suggestion {
                    id: id(),
                    kind: SuggestionKind::Grammar,
                    message: format!("Repeated word \"{}\"", word.text),
                    explanation: "The same word appears twice in a row.".into(),
                    replacements: vec![String::new()],
                    offset: prev.offset + prev.len(),
                    length: word.offset + word.len() - prev.offset - prev.len(),
                    source_context: context_around(text, prev.offset, word.offset + word.len()),
                    severity: Severity::Low,
                    confidence: DOUBLED_WORD_CONFIDENCE,
                    origin: Origin::Rules,
                });
            }
        }

        suggestions.extend(spacing_issues(text, &mut id));

        suggestions.retain(|s| s.confidence >= options.min_confidence);
        suggestions.sort_by_key(|s| s.offset);
        suggestions.truncate(options.max_suggestions);
        suggestions
    }
}

struct Word<'a> {
    text: &'a str,
    /// Char offset of the word start.
    offset: usize,
    /// The raw word carried sentence-ending punctuation before trimming.
    ends_sentence: bool,
}

impl Word<'_> {
    fn len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Words with their char offsets. Splits on whitespace only, so trailing
/// punctuation stays attached and is stripped per rule as needed.
fn split_words(text: &str) -> Vec<Word<'_>> {
    let mut words = Vec::new();
    let mut offset = 0usize;
    let mut start = 0usize;
    let mut in_word = false;
    let mut byte_start = 0usize;

    for (byte_idx, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word {
                words.push((&text[byte_start..byte_idx], start));
                in_word = false;
            }
        } else if !in_word {
            in_word = true;
            start = offset;
            byte_start = byte_idx;
        }
        offset += 1;
    }
    if in_word {
        words.push((&text[byte_start..], start));
    }
    words
        .into_iter()
        .map(|(raw, offset)| {
            // Strip trailing sentence punctuation so "teh." still matches,
            // but remember the boundary so rules spanning word pairs can
            // refuse to cross it.
            let trimmed = raw.trim_end_matches(['.', ',', '!', '?', ';', ':']);
            Word {
                text: trimmed,
                offset,
                ends_sentence: raw.ends_with(['.', '!', '?']),
            }
        })
        .filter(|w| !w.text.is_empty())
        .collect()
}

fn spacing_issues(text: &str, id: &mut impl FnMut() -> String) -> Vec<Suggestion> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();

    for i in 1..chars.len() {
        if chars[i] == ' ' && chars[i - 1] == ' ' {
            // Report once per run of spaces.
            if i >= 2 && chars[i - 2] == ' ' {
                continue;
            }
            out.push(Suggestion {
                id: id(),
                kind: SuggestionKind::Punctuation,
                message: "Doubled space".into(),
                explanation: "Multiple consecutive spaces.".into(),
                replacements: vec![" ".into()],
                offset: i - 1,
                length: chars[i..].iter().take_while(|&&c| c == ' ').count() + 1,
                source_context: context_around(text, i - 1, i + 1),
                severity: Severity::Low,
                confidence: SPACING_CONFIDENCE,
                origin: Origin::Rules,
            });
        }

        if matches!(chars[i], '.' | ',' | '!' | '?' | ';' | ':')
            && chars[i - 1] == ' '
            && (i < 2 || chars[i - 2] != ' ')
        {
            out.push(Suggestion {
                id: id(),
                kind: SuggestionKind::Punctuation,
                message: format!("Space before \"{}\"", chars[i]),
                explanation: "Punctuation should follow the preceding word directly.".into(),
                replacements: vec![chars[i].to_string()],
                offset: i - 1,
                length: 2,
                source_context: context_around(text, i - 1, i + 1),
                severity: Severity::Low,
                confidence: SPACING_CONFIDENCE,
                origin: Origin::Rules,
            });
        }
    }
    out
}

/// Preserve leading-capital case when substituting a correction.
fn match_case(correction: &str, original: &str) -> String {
    if original.chars().next().is_some_and(|c| c.is_uppercase()) {
        let mut chars = correction.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    } else {
        correction.to_string()
    }
}

fn context_around(text: &str, start: usize, end: usize) -> String {
    let len = text.chars().count();
    let lo = start.saturating_sub(20);
    let hi = (end + 20).min(len);
    text.chars().skip(lo).take(hi - lo).collect()
}
