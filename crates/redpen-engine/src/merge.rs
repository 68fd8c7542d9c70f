//! Merging suggestion lists and remapping offsets across edits.
//!
//! Merge combines results from multiple sources into one consistent set:
//! stale suggestions inside changed ranges are dropped, exact-span
//! collisions resolve by confidence, and the result is offset-ordered.
//! Remap keeps untouched suggestions pointing at the right characters after
//! every local edit; it must run synchronously on the edit, not on check
//! completion, or later-arriving suggestions would reference stale offsets.

use redpen_core::{ChangeRegion, Edit, Suggestion};
use tracing::trace;

/// Merge `incoming` suggestions into `existing`.
///
/// When `changed_ranges` is supplied (incremental mode), existing
/// suggestions lying entirely inside a changed range are stale and dropped;
/// everything else is kept. On an exact `(offset, length)` collision the
/// higher-confidence suggestion wins. The result is sorted by offset.
pub fn merge(
    existing: Vec<Suggestion>,
    incoming: Vec<Suggestion>,
    changed_ranges: Option<&[ChangeRegion]>,
) -> Vec<Suggestion> {
    let mut kept: Vec<Suggestion> = match changed_ranges {
        Some(ranges) => existing
            .into_iter()
            .filter(|s| !ranges.iter().any(|r| s.contained_in(r.start, r.end)))
            .collect(),
        None => existing,
    };

    for candidate in incoming {
        match kept
            .iter_mut()
            .find(|s| s.offset == candidate.offset && s.length == candidate.length)
        {
            Some(current) => {
                if candidate.confidence > current.confidence {
                    trace!(
                        offset = candidate.offset,
                        winner = ?candidate.origin,
                        "span collision resolved by confidence"
                    );
                    *current = candidate;
                }
            }
            None => kept.push(candidate),
        }
    }

    kept.sort_by_key(|s| (s.offset, s.length));
    kept
}

/// Rewrite suggestion offsets after a local edit.
///
/// Suggestions entirely before the edited span are untouched; suggestions
/// overlapping it no longer correspond to known text and are dropped;
/// suggestions entirely after shift by the edit's net length delta.
pub fn remap(suggestions: Vec<Suggestion>, edit: &Edit) -> Vec<Suggestion> {
    let delta = edit.delta();
    suggestions
        .into_iter()
        .filter_map(|mut s| {
            if s.end() <= edit.offset {
                Some(s)
            } else if s.offset >= edit.end() {
                s.offset = (s.offset as isize + delta) as usize;
                Some(s)
            } else {
                None
            }
        })
        .collect()
}
