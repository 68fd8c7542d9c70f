//! Paragraph-level change detection between analysis cycles.
//!
//! Text is split on blank-line boundaries into paragraph units; each unit is
//! compared by index against the snapshot taken at the last successful check.
//! When whole units disappear (a structural deletion) the entire document is
//! reported as changed rather than risking an incorrect partial diff.

use redpen_core::ChangeRegion;
use tracing::debug;

/// One paragraph unit with its char-offset span.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Paragraph {
    text: String,
    start: usize,
    end: usize,
}

/// Diffs incoming text against the last-analyzed snapshot.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    snapshot: Vec<Paragraph>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a snapshot from a previous successful check exists.
    pub fn has_snapshot(&self) -> bool {
        !self.snapshot.is_empty()
    }

    /// Regions of `text` that differ from the snapshot, in document order.
    ///
    /// With no snapshot, or when the snapshot has strictly more paragraph
    /// units than `text`, the whole document is one region.
    pub fn diff(&self, text: &str) -> Vec<ChangeRegion> {
        let current = split_paragraphs(text);
        let total = text.chars().count();

        if self.snapshot.is_empty() || self.snapshot.len() > current.len() {
            return vec![ChangeRegion { start: 0, end: total, paragraph_index: 0 }];
        }

        let mut regions = Vec::new();
        for (idx, para) in current.iter().enumerate() {
            let unchanged = self
                .snapshot
                .get(idx)
                .is_some_and(|prev| prev.text == para.text);
            if !unchanged {
                regions.push(ChangeRegion {
                    start: para.start,
                    end: para.end,
                    paragraph_index: idx,
                });
            }
        }
        debug!(changed = regions.len(), paragraphs = current.len(), "change diff");
        regions
    }

    /// Replace the snapshot with the freshly analyzed text's paragraph map.
    /// Call only after a successful check.
    pub fn commit(&mut self, text: &str) {
        self.snapshot = split_paragraphs(text);
    }

    pub fn reset(&mut self) {
        self.snapshot.clear();
    }
}

/// Split on blank-line boundaries, tracking char offsets. Paragraph spans
/// exclude the separating blank lines.
fn split_paragraphs(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut start = 0usize;
    let mut pos = 0usize;
    let mut current = String::new();

    for line in text.split_inclusive('\n') {
        let line_chars = line.chars().count();
        if line.trim().is_empty() {
            if !current.is_empty() {
                let trimmed_len = current.trim_end_matches('\n').chars().count();
                paragraphs.push(Paragraph {
                    text: current.trim_end_matches('\n').to_string(),
                    start,
                    end: start + trimmed_len,
                });
                current.clear();
            }
        } else {
            if current.is_empty() {
                start = pos;
            }
            current.push_str(line);
        }
        pos += line_chars;
    }
    if !current.is_empty() {
        let trimmed_len = current.trim_end_matches('\n').chars().count();
        paragraphs.push(Paragraph {
            text: current.trim_end_matches('\n').to_string(),
            start,
            end: start + trimmed_len,
        });
    }
    paragraphs
}

/// Expand `[start, end)` by `window` chars each way, then out to the nearest
/// sentence boundaries, so incremental checks carry enough context.
pub fn expand_to_sentence(text: &str, start: usize, end: usize, window: usize) -> (usize, usize) {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut lo = start.saturating_sub(window);
    let mut hi = (end + window).min(len);

    while lo > 0 && !is_sentence_boundary(chars[lo - 1]) {
        lo -= 1;
    }
    while hi < len && !is_sentence_boundary(chars[hi.saturating_sub(1).min(len - 1)]) {
        hi += 1;
    }
    (lo, hi.min(len))
}

fn is_sentence_boundary(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\n')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_diff_marks_whole_document() {
        let d = ChangeDetector::new();
        let regions = d.diff("Hello world.\n\nSecond paragraph.");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start, 0);
        assert_eq!(regions[0].end, "Hello world.\n\nSecond paragraph.".chars().count());
    }

    #[test]
    fn unchanged_text_yields_no_regions() {
        let mut d = ChangeDetector::new();
        let text = "Hello world.\n\nSecond paragraph.";
        d.commit(text);
        assert!(d.diff(text).is_empty());
    }

    #[test]
    fn single_paragraph_change_is_isolated() {
        let mut d = ChangeDetector::new();
        d.commit("First paragraph.\n\nSecond paragraph.\n\nThird paragraph.");
        let edited = "First paragraph.\n\nSecond paragraf.\n\nThird paragraph.";
        let regions = d.diff(edited);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].paragraph_index, 1);
        let span: String = edited
            .chars()
            .skip(regions[0].start)
            .take(regions[0].len())
            .collect();
        assert_eq!(span, "Second paragraf.");
    }

    #[test]
    fn appended_paragraph_is_the_only_change() {
        let mut d = ChangeDetector::new();
        d.commit("First paragraph.");
        let regions = d.diff("First paragraph.\n\nBrand new paragraph.");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].paragraph_index, 1);
    }

    #[test]
    fn structural_deletion_marks_whole_document() {
        let mut d = ChangeDetector::new();
        d.commit("One.\n\nTwo.\n\nThree.");
        let regions = d.diff("One.\n\nThree.");
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start, 0);
        assert_eq!(regions[0].paragraph_index, 0);
    }

    #[test]
    fn commit_replaces_snapshot() {
        let mut d = ChangeDetector::new();
        d.commit("Old text.");
        d.commit("New text.");
        assert!(d.diff("New text.").is_empty());
        assert_eq!(d.diff("Old text.").len(), 1);
    }

    #[test]
    fn split_tracks_offsets() {
        let paras = split_paragraphs("abc\ndef\n\nxyz");
        assert_eq!(paras.len(), 2);
        assert_eq!((paras[0].start, paras[0].end), (0, 7));
        assert_eq!(paras[0].text, "abc\ndef");
        assert_eq!((paras[1].start, paras[1].end), (9, 12));
        assert_eq!(paras[1].text, "xyz");
    }

    #[test]
    fn expand_reaches_sentence_boundaries() {
        let text = "First sentence. Second sentence is here. Third one.";
        // A tight span inside the second sentence.
        let (lo, hi) = expand_to_sentence(text, 23, 27, 5);
        let slice: String = text.chars().skip(lo).take(hi - lo).collect();
        assert!(slice.contains("Second sentence is here."), "got {slice:?}");
        // Expansion must not leak into the third sentence's body.
        assert!(!slice.contains("Third"));
    }

    #[test]
    fn expand_clamps_to_document_bounds() {
        let text = "no punctuation at all";
        let (lo, hi) = expand_to_sentence(text, 3, 6, 10);
        assert_eq!(lo, 0);
        assert_eq!(hi, text.chars().count());
    }
}
