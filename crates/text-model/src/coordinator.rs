//! The edit coordinator.
//!
//! A thin layer over the three stores. For every text mutation it applies
//! the same edit, in this order, to:
//!
//! 1. the line store (lengths updated, lines split/merged as terminators
//!    move),
//! 2. the run store (runs re-offset, the edited span reset to plain),
//! 3. the selection set (ranges rebased).
//!
//! The order matters: the run store's tail-extension fallback assumes the
//! line store's length is already authoritative. The coordinator performs
//! no locking; the host must serialize edits onto one logical thread.
//!
//! Re-highlighting is incremental and supersede-only: each edit bumps a
//! generation counter and records the invalidated span, highlight queries
//! carry the generation they were issued at, and completions from before a
//! newer edit are discarded rather than merged.

use std::ops::Range;

use crate::delta::{TextEdit, line_lengths_utf16, terminator_ends_utf16};
use crate::fragment::{LayoutOptions, TextMeasure};
use crate::line_storage::LineStorage;
use crate::range_store::{RangeRun, RangeStore, RangeValue};
use crate::selection::{Direction, SelectionSet};

/// External tokenizer collaborator.
///
/// Tags are opaque to the model; the provider is only consulted about
/// edits (returning any extra spans its own state considers invalidated)
/// and queried span-wise by the host through [`HighlightQuery`] tokens.
pub trait HighlightProvider<V: RangeValue> {
    /// Notify the provider of an edit (`edited_range` in post-edit
    /// coordinates). Returns additional invalidated ranges, also in
    /// post-edit coordinates.
    fn apply_edit(&mut self, edited_range: Range<usize>, delta: isize) -> Vec<Range<usize>>;
}

/// A token for one in-flight highlight request.
///
/// Issued by [`EditCoordinator::begin_highlight`] at the current edit
/// generation; a completion is only applied while that generation is still
/// current, so a request outlived by an edit is superseded, never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightQuery {
    range: Range<usize>,
    generation: u64,
}

impl HighlightQuery {
    /// The span to tokenize.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }
}

/// Owns the three stores and keeps them synchronized under edits.
pub struct EditCoordinator<V: RangeValue> {
    lines: LineStorage,
    runs: RangeStore<V>,
    selections: SelectionSet,
    estimated_line_height: f64,
    generation: u64,
    /// Spans whose runs are stale, sorted and non-overlapping,
    /// post-edit coordinates.
    invalid: Vec<Range<usize>>,
}

impl<V: RangeValue> EditCoordinator<V> {
    /// Bulk-build the model from the document's initial text.
    ///
    /// The whole document starts out invalid: nothing has been
    /// highlighted yet.
    pub fn new(text: &str, estimated_line_height: f64) -> Self {
        let lines = LineStorage::build(line_lengths_utf16(text), estimated_line_height);
        let len = lines.len();
        Self {
            lines,
            runs: RangeStore::new(len),
            selections: SelectionSet::new(),
            estimated_line_height,
            generation: 0,
            invalid: if len > 0 { vec![0..len] } else { Vec::new() },
        }
    }

    /// Document length in UTF-16 code units.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// `true` when the document is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The line store.
    pub fn line_storage(&self) -> &LineStorage {
        &self.lines
    }

    /// Mutable line store access, for layout passes (fragment computation
    /// and dirty marking). Length-changing calls belong to
    /// [`apply_edit`](Self::apply_edit) only.
    pub fn line_storage_mut(&mut self) -> &mut LineStorage {
        &mut self.lines
    }

    /// The run store.
    pub fn range_store(&self) -> &RangeStore<V> {
        &self.runs
    }

    /// Mutable run store access, for hosts that write attribute runs
    /// directly (invisible-character markers and the like).
    pub fn range_store_mut(&mut self) -> &mut RangeStore<V> {
        &mut self.runs
    }

    /// The selection set.
    pub fn selections(&self) -> &SelectionSet {
        &self.selections
    }

    /// Replace the selection set with a single range, clamped to the
    /// document bounds.
    pub fn set_selected_range(&mut self, range: Range<usize>) {
        let len = self.len();
        self.selections
            .set_selected_range(range.start.min(len)..range.end.min(len));
    }

    /// Replace the selection set with multiple ranges, clamped to the
    /// document bounds.
    pub fn set_selected_ranges(&mut self, ranges: impl IntoIterator<Item = Range<usize>>) {
        let len = self.len();
        self.selections
            .set_selected_ranges(ranges.into_iter().map(|r| r.start.min(len)..r.end.min(len)));
    }

    /// Mutable selection access.
    pub fn selections_mut(&mut self) -> &mut SelectionSet {
        &mut self.selections
    }

    /// Move every caret one visual line up or down, laying out the touched
    /// lines as needed.
    pub fn move_carets_vertically<M: TextMeasure>(
        &mut self,
        text: &str,
        direction: Direction,
        options: &LayoutOptions<M>,
    ) {
        self.selections
            .move_carets_vertically(text, &mut self.lines, direction, options);
    }

    /// The current edit generation; bumped by every applied edit.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Spans whose highlight runs are stale, sorted and non-overlapping.
    pub fn invalid_ranges(&self) -> &[Range<usize>] {
        &self.invalid
    }

    /// Apply a document mutation to all three stores.
    ///
    /// `edit.range` must not split a `\r\n` pair; the pair is atomic
    /// throughout the model (the break strategies and character movement
    /// never separate it either).
    pub fn apply_edit(&mut self, edit: &TextEdit) {
        self.apply_edit_inner(edit, false, None::<&mut NoProvider>);
    }

    /// Like [`apply_edit`](Self::apply_edit), but selections after the
    /// edit keep their lengths (programmatic edits such as autocomplete
    /// insertion).
    pub fn apply_edit_retaining_selections(&mut self, edit: &TextEdit) {
        self.apply_edit_inner(edit, true, None::<&mut NoProvider>);
    }

    /// Apply a mutation and forward it to a highlight provider, folding
    /// the provider's extra invalidations into the invalid set.
    pub fn apply_edit_with_provider(
        &mut self,
        edit: &TextEdit,
        provider: &mut impl HighlightProvider<V>,
    ) {
        self.apply_edit_inner(edit, false, Some(provider));
    }

    fn apply_edit_inner(
        &mut self,
        edit: &TextEdit,
        retain_selections: bool,
        provider: Option<&mut impl HighlightProvider<V>>,
    ) {
        let len = self.len();
        debug_assert!(
            edit.range.start <= edit.range.end && edit.range.end <= len,
            "edit range out of bounds"
        );
        let start = edit.range.start.min(len);
        let end = edit.range.end.min(len).max(start);
        let replaced = start..end;
        let inserted_len = edit.inserted_len();
        let delta = inserted_len as isize - replaced.len() as isize;

        // 1. Lines, 2. runs, 3. selections; see the module docs for why
        // this order is load-bearing.
        let touched = self.sync_lines(&replaced, &edit.inserted);
        self.runs.storage_updated_replacing(replaced.clone(), inserted_len);
        debug_assert_eq!(self.lines.len(), self.runs.len(), "stores disagree on length");
        self.selections
            .apply_edit(replaced.clone(), inserted_len, retain_selections);

        self.generation += 1;
        self.rebase_invalid(&replaced, delta);
        self.add_invalid(touched);
        if let Some(provider) = provider {
            let edited = replaced.start..replaced.start + inserted_len;
            for extra in provider.apply_edit(edited, delta) {
                self.add_invalid(extra);
            }
        }
    }

    /// Issue a highlight query for `range` at the current generation.
    pub fn begin_highlight(&mut self, range: Range<usize>) -> Option<HighlightQuery> {
        let len = self.len();
        let start = range.start.min(len);
        let end = range.end.min(len);
        if start >= end {
            return None;
        }
        Some(HighlightQuery {
            range: start..end,
            generation: self.generation,
        })
    }

    /// Apply a completed highlight response.
    ///
    /// Returns `false` (discarding the runs) when the query was issued
    /// before a newer edit or its range is no longer tracked; the affected
    /// span keeps its prior, stale runs, which remain internally
    /// consistent.
    pub fn complete_highlight(&mut self, query: HighlightQuery, runs: Vec<RangeRun<V>>) -> bool {
        if query.generation != self.generation {
            return false;
        }
        if query.range.end > self.runs.len() {
            return false;
        }
        self.runs.set_runs(runs, query.range.clone());
        self.clear_invalid(&query.range);
        true
    }

    /// Merge lines overlapped by the replaced span, apply the length
    /// delta, then split at every terminator of the inserted text.
    /// Returns the post-edit span of the touched lines.
    fn sync_lines(&mut self, replaced: &Range<usize>, inserted: &str) -> Range<usize> {
        if self.lines.count() == 0 {
            self.lines =
                LineStorage::build(line_lengths_utf16(inserted), self.estimated_line_height);
            return 0..self.lines.len();
        }

        let Some(first) = self
            .lines
            .line_at_offset(replaced.start)
            .or_else(|| self.lines.last_line())
        else {
            return replaced.clone();
        };
        let Some(last) = (if replaced.end >= self.lines.len() {
            self.lines.last_line()
        } else {
            self.lines.line_at_offset(replaced.end)
        }) else {
            return replaced.clone();
        };

        // Merge every overlapped line into the first; the retained tail of
        // the last line joins it.
        for _ in first.index..last.index {
            self.lines.remove_at(first.index + 1);
        }
        let merged_len = (last.offset + last.length) - first.offset;
        let inserted_len = crate::delta::utf16_len(inserted);
        let new_len = merged_len + inserted_len - replaced.len();
        self.lines.with_line_mut(first.index, |line| {
            line.length = new_len;
            line.layout.invalidate();
        });

        // Split at each terminator the replacement introduced.
        let mut index = first.index;
        let mut cursor_start = first.offset;
        let mut cursor_len = new_len;
        for terminator_end in terminator_ends_utf16(inserted) {
            let boundary = replaced.start + terminator_end;
            let head = boundary - cursor_start;
            let tail = cursor_len - head;
            self.lines.with_line_mut(index, |line| {
                line.length = head;
                line.layout.invalidate();
            });
            self.lines
                .insert_at(index + 1, tail, self.estimated_line_height);
            index += 1;
            cursor_start = boundary;
            cursor_len = tail;
        }

        first.offset..first.offset + new_len
    }

    /// Re-express the invalid set in post-edit coordinates.
    fn rebase_invalid(&mut self, replaced: &Range<usize>, delta: isize) {
        let map = |offset: usize| -> usize {
            if offset <= replaced.start {
                offset
            } else if offset >= replaced.end {
                (offset as isize + delta).max(replaced.start as isize) as usize
            } else {
                replaced.start
            }
        };
        let mut rebased = Vec::with_capacity(self.invalid.len());
        for range in self.invalid.drain(..) {
            let start = map(range.start);
            let end = map(range.end);
            if start < end {
                rebased.push(start..end);
            }
        }
        self.invalid = rebased;
    }

    /// Add `range` to the invalid set, merging overlaps and adjacencies.
    fn add_invalid(&mut self, range: Range<usize>) {
        let len = self.len();
        let start = range.start.min(len);
        let end = range.end.min(len);
        if start >= end {
            return;
        }
        self.invalid.push(start..end);
        self.invalid.sort_by_key(|r| (r.start, r.end));
        let mut merged: Vec<Range<usize>> = Vec::with_capacity(self.invalid.len());
        for range in self.invalid.drain(..) {
            match merged.last_mut() {
                Some(last) if range.start <= last.end => {
                    last.end = last.end.max(range.end);
                }
                _ => merged.push(range),
            }
        }
        self.invalid = merged;
    }

    /// Remove `cleared` from the invalid set.
    fn clear_invalid(&mut self, cleared: &Range<usize>) {
        let mut remaining = Vec::with_capacity(self.invalid.len());
        for range in self.invalid.drain(..) {
            if range.end <= cleared.start || range.start >= cleared.end {
                remaining.push(range);
                continue;
            }
            if range.start < cleared.start {
                remaining.push(range.start..cleared.start);
            }
            if range.end > cleared.end {
                remaining.push(cleared.end..range.end);
            }
        }
        self.invalid = remaining;
    }
}

/// Placeholder provider type for the provider-less entry points.
struct NoProvider;

impl<V: RangeValue> HighlightProvider<V> for NoProvider {
    fn apply_edit(&mut self, _edited_range: Range<usize>, _delta: isize) -> Vec<Range<usize>> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::utf16_len;

    type Coordinator = EditCoordinator<u32>;

    fn line_lengths(coordinator: &Coordinator) -> Vec<usize> {
        coordinator.line_storage().iter().map(|l| l.length).collect()
    }

    fn assert_lengths_agree(coordinator: &Coordinator) {
        let line_sum: usize = coordinator.line_storage().iter().map(|l| l.length).sum();
        assert_eq!(line_sum, coordinator.line_storage().len());
        assert_eq!(line_sum, coordinator.range_store().len());
    }

    #[test]
    fn test_build_from_text() {
        let coordinator = Coordinator::new("fn main() {\n    body\n}\n", 16.0);
        assert_eq!(line_lengths(&coordinator), vec![12, 9, 2, 0]);
        assert_eq!(coordinator.len(), 23);
        assert_lengths_agree(&coordinator);
        assert_eq!(coordinator.invalid_ranges(), &[0..23]);
    }

    #[test]
    fn test_same_line_insertion() {
        let mut coordinator = Coordinator::new("ab\ncd\n", 16.0);
        coordinator.apply_edit(&TextEdit::insertion(4, "XY"));
        assert_eq!(line_lengths(&coordinator), vec![3, 5, 0]);
        assert_lengths_agree(&coordinator);
    }

    #[test]
    fn test_newline_insertion_splits_line() {
        let mut coordinator = Coordinator::new("abcdef\n", 16.0);
        coordinator.apply_edit(&TextEdit::insertion(3, "\n"));
        assert_eq!(line_lengths(&coordinator), vec![4, 4, 0]);
        assert_lengths_agree(&coordinator);

        let line = coordinator.line_storage().line_at_offset(4).expect("line");
        assert_eq!(line.index, 1);
        assert_eq!(line.offset, 4);
    }

    #[test]
    fn test_multi_line_paste() {
        let mut coordinator = Coordinator::new("head tail\n", 16.0);
        coordinator.apply_edit(&TextEdit::insertion(5, "one\ntwo\n"));
        assert_eq!(line_lengths(&coordinator), vec![9, 4, 5, 0]);
        assert_lengths_agree(&coordinator);
    }

    #[test]
    fn test_terminator_deletion_merges_lines() {
        let mut coordinator = Coordinator::new("ab\ncd\nef\n", 16.0);
        // Delete the first terminator.
        coordinator.apply_edit(&TextEdit::deletion(2..3));
        assert_eq!(line_lengths(&coordinator), vec![5, 3, 0]);
        assert_lengths_agree(&coordinator);
    }

    #[test]
    fn test_multi_line_deletion() {
        let mut coordinator = Coordinator::new("aaa\nbbb\nccc\nddd\n", 16.0);
        // Delete from inside line 0 to inside line 2.
        coordinator.apply_edit(&TextEdit::deletion(1..9));
        assert_eq!(line_lengths(&coordinator), vec![4, 4, 0]);
        assert_lengths_agree(&coordinator);
    }

    #[test]
    fn test_replacement_spanning_lines() {
        let mut coordinator = Coordinator::new("one\ntwo\nthree\n", 16.0);
        coordinator.apply_edit(&TextEdit::new(2..9, "X\nY"));
        // "on" + "X\nY" + "hree\n" -> "onX" / "Yhree" / ""
        assert_eq!(line_lengths(&coordinator), vec![4, 6, 0]);
        assert_lengths_agree(&coordinator);
    }

    #[test]
    fn test_crlf_insertion() {
        let mut coordinator = Coordinator::new("abcd", 16.0);
        coordinator.apply_edit(&TextEdit::insertion(2, "\r\n"));
        assert_eq!(line_lengths(&coordinator), vec![4, 2]);
        assert_lengths_agree(&coordinator);
    }

    #[test]
    fn test_edit_into_empty_document() {
        let mut coordinator = Coordinator::new("", 16.0);
        assert_eq!(coordinator.len(), 0);
        coordinator.apply_edit(&TextEdit::insertion(0, "hello\nworld"));
        assert_eq!(line_lengths(&coordinator), vec![6, 5]);
        assert_lengths_agree(&coordinator);
    }

    #[test]
    fn test_delete_everything_keeps_one_line() {
        let mut coordinator = Coordinator::new("ab\ncd\n", 16.0);
        coordinator.apply_edit(&TextEdit::deletion(0..6));
        assert_eq!(line_lengths(&coordinator), vec![0]);
        assert_eq!(coordinator.len(), 0);
        assert_lengths_agree(&coordinator);
    }

    #[test]
    fn test_random_edit_sequence_conserves_length() {
        // Mirror the document in a Vec<char>-free way: track only length.
        let mut coordinator = Coordinator::new("alpha\nbeta\ngamma\n", 16.0);
        let edits = [
            TextEdit::insertion(3, "xx\nyy"),
            TextEdit::deletion(1..8),
            TextEdit::new(0..2, "Z"),
            TextEdit::insertion(9, "\n\n\n"),
            TextEdit::deletion(4..12),
        ];
        let mut expected_len = utf16_len("alpha\nbeta\ngamma\n") as isize;
        for edit in &edits {
            coordinator.apply_edit(edit);
            expected_len += edit.delta();
            assert_eq!(coordinator.len() as isize, expected_len);
            assert_lengths_agree(&coordinator);

            // Order invariant: strictly increasing, gap-free starts.
            let mut offset = 0usize;
            for line in coordinator.line_storage().iter() {
                assert_eq!(line.offset, offset);
                offset += line.length;
            }
        }
    }

    #[test]
    fn test_selection_rebased_after_edit() {
        let mut coordinator = Coordinator::new("hello world\n", 16.0);
        coordinator.set_selected_range(5..10);
        coordinator.apply_edit(&TextEdit::deletion(3..11));
        assert_eq!(coordinator.selections().selections()[0].range, 3..3);
    }

    #[test]
    fn test_highlight_round_trip() {
        let mut coordinator = Coordinator::new("let x = 1;\n", 16.0);
        let query = coordinator.begin_highlight(0..10).expect("non-empty");
        let applied = coordinator.complete_highlight(
            query,
            vec![
                RangeRun::new(3, Some(1)),
                RangeRun::plain(7),
            ],
        );
        assert!(applied);
        let runs = coordinator.range_store().runs_in(0..10);
        assert_eq!(runs[0].value, Some(1));
        // The completed span is no longer invalid; the trailing newline is.
        assert_eq!(coordinator.invalid_ranges(), &[10..11]);
    }

    #[test]
    fn test_stale_highlight_is_discarded() {
        let mut coordinator = Coordinator::new("let x = 1;\n", 16.0);
        let query = coordinator.begin_highlight(0..10).expect("non-empty");
        // An edit lands before the response.
        coordinator.apply_edit(&TextEdit::insertion(0, "pub "));
        let applied =
            coordinator.complete_highlight(query, vec![RangeRun::new(10, Some(1))]);
        assert!(!applied);
        // Runs stay plain (stale but consistent).
        assert!(coordinator.range_store().runs_in(0..15).iter().all(|r| r.value.is_none()));
    }

    #[test]
    fn test_invalid_ranges_track_edits() {
        let mut coordinator = Coordinator::new("aaaa\nbbbb\ncccc\n", 16.0);
        // Highlight the whole document, then dirty one line.
        let query = coordinator.begin_highlight(0..15).expect("non-empty");
        coordinator.complete_highlight(query, vec![RangeRun::plain(15)]);
        assert!(coordinator.invalid_ranges().is_empty());

        coordinator.apply_edit(&TextEdit::insertion(6, "X"));
        // Only the edited line's span is invalid.
        assert_eq!(coordinator.invalid_ranges(), &[5..11]);
    }

    #[test]
    fn test_provider_extra_invalidations_are_merged() {
        struct RippleProvider;
        impl HighlightProvider<u32> for RippleProvider {
            fn apply_edit(&mut self, edited: Range<usize>, _delta: isize) -> Vec<Range<usize>> {
                // Pretend a multi-line construct re-opened below the edit.
                vec![edited.end..edited.end + 4]
            }
        }

        let mut coordinator = Coordinator::new("aaaa\nbbbb\ncccc\n", 16.0);
        let query = coordinator.begin_highlight(0..15).expect("non-empty");
        coordinator.complete_highlight(query, vec![RangeRun::plain(15)]);

        let mut provider = RippleProvider;
        coordinator.apply_edit_with_provider(&TextEdit::insertion(6, "X"), &mut provider);
        assert_eq!(coordinator.invalid_ranges(), &[5..11]);

        coordinator.apply_edit_with_provider(&TextEdit::insertion(0, "Z"), &mut provider);
        // Line 0 span plus the provider ripple merge with the rebased set.
        assert_eq!(coordinator.invalid_ranges(), &[0..12]);
    }

    #[test]
    fn test_retaining_edit_preserves_selection_length() {
        let mut coordinator = Coordinator::new("hello world\n", 16.0);
        coordinator.set_selected_range(6..11);
        coordinator.apply_edit_retaining_selections(&TextEdit::insertion(0, "> "));
        assert_eq!(coordinator.selections().selections()[0].range, 8..13);
    }
}
