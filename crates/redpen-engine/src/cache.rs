//! Result cache with exact and fuzzy lookup over prior analysis results.
//!
//! Exact hits key on a content fingerprint of the full text plus options.
//! Fuzzy hits exist because re-analysis is frequently requested for text that
//! changed only slightly: entries are indexed by a coarse signature (word
//! count, average word length, first/last words) and accepted only when the
//! candidate's recorded length is within a tolerance of the current length,
//! bounding false-hit risk.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::{Duration, Instant};

use redpen_core::CheckOptions;
use tracing::debug;

/// Cache bounds. Entries older than `max_age` or beyond `max_entries`
/// (oldest first) are evicted before any new insert.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_age: Duration,
    /// Fuzzy hits require the candidate text length within this fraction of
    /// the current length.
    pub fuzzy_length_tolerance: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 64,
            max_age: Duration::from_secs(300),
            fuzzy_length_tolerance: 0.10,
        }
    }
}

/// Hit/miss bookkeeping, exposed for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub exact_hits: u64,
    pub fuzzy_hits: u64,
    pub misses: u64,
}

struct CacheEntry<T> {
    value: T,
    created: Instant,
    exact_key: u64,
    fuzzy_key: String,
    text_len: usize,
    language: String,
}

/// Time- and size-bounded analysis result cache.
pub struct ResultCache<T> {
    config: CacheConfig,
    /// Insertion-ordered; eviction drops from the front.
    entries: Vec<CacheEntry<T>>,
    by_exact: HashMap<u64, usize>,
    stats: CacheStats,
}

impl<T: Clone> ResultCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            by_exact: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Look up a prior result: exact fingerprint first, then fuzzy signature
    /// guarded by the length tolerance.
    pub fn get(&mut self, text: &str, options: &CheckOptions) -> Option<T> {
        self.expire(Instant::now());

        let exact = exact_key(text, options);
        if let Some(&idx) = self.by_exact.get(&exact) {
            self.stats.exact_hits += 1;
            return Some(self.entries[idx].value.clone());
        }

        let fuzzy = fuzzy_key(text);
        let len = text.chars().count();
        let tolerance = (len as f64 * self.config.fuzzy_length_tolerance).ceil() as usize;
        let candidate = self.entries.iter().rev().find(|e| {
            e.fuzzy_key == fuzzy
                && e.language == options.language
                && e.text_len.abs_diff(len) <= tolerance
        });
        if let Some(entry) = candidate {
            self.stats.fuzzy_hits += 1;
            debug!(text_len = len, cached_len = entry.text_len, "fuzzy cache hit");
            return Some(entry.value.clone());
        }

        self.stats.misses += 1;
        None
    }

    /// Insert a result, evicting expired and over-bound entries first.
    pub fn set(&mut self, text: &str, options: &CheckOptions, value: T) {
        let now = Instant::now();
        self.expire(now);

        let exact = exact_key(text, options);
        if let Some(&idx) = self.by_exact.get(&exact) {
            // Refresh in place rather than duplicating the key. Checked
            // before size eviction so a refresh at capacity cannot push out
            // an unrelated entry.
            self.entries[idx].value = value;
            self.entries[idx].created = now;
            return;
        }

        while self.entries.len() >= self.config.max_entries {
            self.remove_front();
        }

        self.entries.push(CacheEntry {
            value,
            created: now,
            exact_key: exact,
            fuzzy_key: fuzzy_key(text),
            text_len: text.chars().count(),
            language: options.language.clone(),
        });
        self.by_exact.insert(exact, self.entries.len() - 1);
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_exact.clear();
    }

    fn expire(&mut self, now: Instant) {
        let max_age = self.config.max_age;
        if self.entries.iter().any(|e| now.duration_since(e.created) >= max_age) {
            self.entries.retain(|e| now.duration_since(e.created) < max_age);
            self.reindex();
        }
    }

    fn remove_front(&mut self) {
        self.entries.remove(0);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.by_exact = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.exact_key, i))
            .collect();
    }
}

/// Content fingerprint of the full input plus options.
fn exact_key(text: &str, options: &CheckOptions) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    options.language.hash(&mut hasher);
    options.min_confidence.hash(&mut hasher);
    options.max_suggestions.hash(&mut hasher);
    hasher.finish()
}

/// Coarse signature: word count bucket, rounded average word length, and the
/// first/last two words. Deliberately insensitive to small interior edits.
fn fuzzy_key(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return "empty".into();
    }
    let total_len: usize = words.iter().map(|w| w.chars().count()).sum();
    let avg_len = (total_len as f64 / words.len() as f64).round() as usize;
    // Bucket word count so a handful of added words still matches.
    let count_bucket = words.len() / 8;
    let first = words.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
    let last = words
        .iter()
        .rev()
        .take(2)
        .cloned()
        .collect::<Vec<_>>()
        .join(" ");
    format!("{count_bucket}:{avg_len}:{first}:{last}")
}
