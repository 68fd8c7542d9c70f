//! Terminal rendering for suggestion reports.

use redpen_core::{Severity, Suggestion};

const EXCERPT_WINDOW: usize = 25;

/// Print one line per suggestion plus an excerpt of the flagged span.
pub fn print_report(text: &str, suggestions: &[Suggestion]) {
    if suggestions.is_empty() {
        println!("No suggestions.");
        return;
    }

    for s in suggestions {
        let (line, col) = line_col(text, s.offset);
        let flagged = char_range(text, s.offset, s.end());
        print!(
            "{line}:{col}  {:<11} {:<6} {}",
            s.kind.as_str(),
            severity_label(s.severity),
            s.message
        );
        if let Some(first) = s.replacements.first().filter(|r| !r.is_empty()) {
            print!("  [{} -> {}]", flagged, first);
        }
        println!("  ({}%)", s.confidence);
        println!("    {}", excerpt(text, s.offset, s.end(), EXCERPT_WINDOW));
    }
    println!();
    println!("{} suggestion(s).", suggestions.len());
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "HIGH",
    }
}

/// 1-based line and column of a char offset.
fn line_col(text: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for c in text.chars().take(offset) {
        if c == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// The flagged span with up to `window` chars of context each side, ellipsized
/// where it was cut and with newlines flattened for single-line display.
fn excerpt(text: &str, start: usize, end: usize, window: usize) -> String {
    let len = text.chars().count();
    let lo = start.saturating_sub(window);
    let hi = (end + window).min(len);
    let body: String = char_range(text, lo, hi).replace('\n', " ");
    let prefix = if lo > 0 { "..." } else { "" };
    let suffix = if hi < len { "..." } else { "" };
    format!("{prefix}{body}{suffix}")
}

fn char_range(text: &str, start: usize, end: usize) -> String {
    text.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_counts_from_one() {
        assert_eq!(line_col("hello", 0), (1, 1));
        assert_eq!(line_col("hello", 3), (1, 4));
    }

    #[test]
    fn line_col_tracks_newlines() {
        let text = "first\nsecond\nthird";
        assert_eq!(line_col(text, 6), (2, 1));
        assert_eq!(line_col(text, 15), (3, 3));
    }

    #[test]
    fn excerpt_marks_cuts_with_ellipses() {
        let text = "a very long sentence that keeps going well past the window size here";
        let e = excerpt(text, 30, 35, 10);
        assert!(e.starts_with("..."));
        assert!(e.ends_with("..."));
    }

    #[test]
    fn excerpt_at_document_edges_has_no_ellipses() {
        let text = "short text";
        assert_eq!(excerpt(text, 0, 5, 25), "short text");
    }

    #[test]
    fn excerpt_flattens_newlines() {
        let text = "one\ntwo\nthree";
        assert!(!excerpt(text, 4, 7, 25).contains('\n'));
    }

    #[test]
    fn char_range_is_char_indexed() {
        assert_eq!(char_range("héllo wörld", 2, 5), "llo");
    }
}
