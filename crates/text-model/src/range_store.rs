//! Run-length encoded attribute storage.
//!
//! Associates opaque per-code-unit attributes (syntax captures, invisible
//! character styles) with contiguous runs over the document offset space.
//! Runs live in the shared augmented tree, so point and range queries are
//! O(log n + k), and every mutation coalesces adjacent equal runs, keeping
//! the run count proportional to the number of attribute transitions
//! rather than the character count.
//!
//! The store tracks its own total length; [`RangeStore::storage_updated`]
//! must be told about every document edit before any query or write that
//! reflects it, so this length never disagrees with the line store's.

use std::cell::RefCell;
use std::ops::{AddAssign, Range};

use crate::tree::{Dimension, Summarize, Summary, SummaryTree};

/// An attribute value stored in runs.
///
/// Values are opaque to the store; it only needs equality (for coalescing)
/// and an "empty" predicate so that placeholder instances of "no attribute"
/// merge with genuinely absent values.
pub trait RangeValue: Clone + PartialEq {
    /// `true` when this value carries no attribute and should merge with
    /// absent-value runs.
    fn is_empty(&self) -> bool {
        false
    }
}

impl RangeValue for u32 {}
impl RangeValue for usize {}

impl RangeValue for String {
    fn is_empty(&self) -> bool {
        String::is_empty(self)
    }
}

/// One run: `length` code units sharing the same optional value.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeRun<V> {
    /// Length in UTF-16 code units; never zero once stored.
    pub length: usize,
    /// The attribute, or `None` for plain text.
    pub value: Option<V>,
}

impl<V> Default for RangeRun<V> {
    fn default() -> Self {
        Self {
            length: 0,
            value: None,
        }
    }
}

impl<V: RangeValue> RangeRun<V> {
    /// A run carrying `value`.
    pub fn new(length: usize, value: Option<V>) -> Self {
        Self { length, value }
    }

    /// A run with no attribute.
    pub fn plain(length: usize) -> Self {
        Self {
            length,
            value: None,
        }
    }

    /// `true` when the run carries no attribute (absent or empty value).
    pub fn is_plain(&self) -> bool {
        match &self.value {
            None => true,
            Some(value) => value.is_empty(),
        }
    }

    fn coalesces_with(&self, other: &Self) -> bool {
        (self.is_plain() && other.is_plain()) || self.value == other.value
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
/// Aggregate summary of a subtree of [`RangeRun`]s.
pub struct RunSummary {
    count: usize,
    length: usize,
}

impl AddAssign<&RunSummary> for RunSummary {
    fn add_assign(&mut self, other: &RunSummary) {
        self.count += other.count;
        self.length += other.length;
    }
}

impl Summary for RunSummary {
    fn count(&self) -> usize {
        self.count
    }
}

impl<V: RangeValue> Summarize for RangeRun<V> {
    type Summary = RunSummary;

    fn summary(&self) -> RunSummary {
        RunSummary {
            count: 1,
            length: self.length,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
struct ByOffset(usize);

impl Dimension<RunSummary> for ByOffset {
    fn from_summary(summary: &RunSummary) -> Self {
        ByOffset(summary.length)
    }
}

/// Run-length encoded attribute store over the document offset space.
pub struct RangeStore<V: RangeValue> {
    tree: SummaryTree<RangeRun<V>>,
    /// Last range query and its result; highlight callers repeat the exact
    /// same query often enough that this is worth keeping.
    cache: RefCell<Option<(Range<usize>, Vec<RangeRun<V>>)>>,
}

impl<V: RangeValue> RangeStore<V> {
    /// Create a store spanning `document_length` code units of plain text.
    pub fn new(document_length: usize) -> Self {
        let mut tree = SummaryTree::new();
        if document_length > 0 {
            tree.insert(0, RangeRun::plain(document_length));
        }
        Self {
            tree,
            cache: RefCell::new(None),
        }
    }

    /// Tracked total length in UTF-16 code units.
    pub fn len(&self) -> usize {
        self.tree.summary().length
    }

    /// `true` when the tracked length is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored runs.
    pub fn run_count(&self) -> usize {
        self.tree.len()
    }

    /// The run containing `offset`: its full extent and value. `None` when
    /// `offset` is outside `[0, len)`.
    pub fn run_at(&self, offset: usize) -> Option<(Range<usize>, Option<V>)> {
        let hit = self.tree.seek(ByOffset(offset))?;
        let run = self.tree.get(hit.rank)?;
        let start = hit.prefix.length;
        Some((start..start + run.length, run.value.clone()))
    }

    /// Decompose `range` into contiguous, gap-free runs, clipping the first
    /// and last to the query boundary; O(log n + k).
    ///
    /// The result of the most recent query is cached and reused when the
    /// identical range is asked for again.
    pub fn runs_in(&self, range: Range<usize>) -> Vec<RangeRun<V>> {
        let start = range.start.min(self.len());
        let end = range.end.min(self.len());
        if start >= end {
            return Vec::new();
        }
        let key = start..end;
        {
            let cache = self.cache.borrow();
            if let Some((cached_range, cached)) = cache.as_ref() {
                if *cached_range == key {
                    return cached.clone();
                }
            }
        }
        let mut result = Vec::new();
        let Some(hit) = self.tree.seek(ByOffset(start)) else {
            return result;
        };
        let mut pos = hit.prefix.length;
        for run in self.tree.iter_from(hit.rank) {
            if pos >= end {
                break;
            }
            let clipped_start = pos.max(start);
            let clipped_end = (pos + run.length).min(end);
            result.push(RangeRun::new(clipped_end - clipped_start, run.value.clone()));
            pos += run.length;
        }
        *self.cache.borrow_mut() = Some((key, result.clone()));
        result
    }

    /// Overwrite `range` with a single uniform value, coalescing with the
    /// immediate neighbors afterwards.
    pub fn set_value(&mut self, value: Option<V>, range: Range<usize>) {
        debug_assert!(range.end <= self.len(), "set_value range beyond tracked length");
        let length = range.end.min(self.len()).saturating_sub(range.start);
        self.replace(range, vec![RangeRun::new(length, value)]);
    }

    /// Overwrite `range` with a heterogeneous sequence of runs.
    ///
    /// When `range.end` exceeds the tracked length, the store is extended
    /// with plain text first; highlighter responses are allowed to race
    /// slightly ahead of edit-sync calls at this boundary.
    pub fn set_runs(&mut self, runs: Vec<RangeRun<V>>, range: Range<usize>) {
        if range.end > self.len() {
            let len = self.len();
            self.replace(len..len, vec![RangeRun::plain(range.end - len)]);
        }
        debug_assert_eq!(
            runs.iter().map(|r| r.length).sum::<usize>(),
            range.len(),
            "run lengths must cover the replaced range exactly"
        );
        self.replace(range, runs);
    }

    /// Edit sync, `(edited range, length delta)` form: `edited_range` is
    /// the post-edit range of the replacement text.
    pub fn storage_updated(&mut self, edited_range: Range<usize>, delta: isize) {
        let replaced_len = (edited_range.len() as isize - delta).max(0) as usize;
        let replaced = edited_range.start..edited_range.start + replaced_len;
        self.storage_updated_replacing(replaced, edited_range.len());
    }

    /// Edit sync, `(replaced range, new length)` form: the pre-edit range
    /// `replaced` was substituted by `new_length` code units of new text.
    ///
    /// Insertions substitute a plain run for the edited span; deletions
    /// remove the spanned run range entirely. Must be called before any
    /// subsequent query or write that reflects the edit.
    pub fn storage_updated_replacing(&mut self, replaced: Range<usize>, new_length: usize) {
        debug_assert!(
            replaced.end <= self.len(),
            "edit sync must precede dependent queries; replaced range beyond tracked length"
        );
        if new_length == 0 {
            self.replace(replaced, Vec::new());
        } else {
            self.replace(replaced, vec![RangeRun::plain(new_length)]);
        }
    }

    /// Replace the runs overlapping `range` with `new_runs`.
    ///
    /// Boundary runs are clipped, interior runs removed, zero-length runs
    /// elided, and the neighborhood of the splice coalesced.
    fn replace(&mut self, range: Range<usize>, new_runs: Vec<RangeRun<V>>) {
        self.cache.borrow_mut().take();
        let len = self.len();
        debug_assert!(range.start <= len && range.end <= len, "replace range out of bounds");
        let start = range.start.min(len);
        let end = range.end.min(len).max(start);

        if start == end && new_runs.iter().all(|r| r.length == 0) {
            return;
        }

        let insert_rank = if start == end {
            self.split_at(start)
        } else {
            self.carve(start, end)
        };

        let mut inserted = 0usize;
        for run in new_runs {
            if run.length == 0 {
                continue;
            }
            self.tree.insert(insert_rank + inserted, run);
            inserted += 1;
        }

        self.coalesce_ranks(insert_rank.saturating_sub(1), insert_rank + inserted);
    }

    /// Make `offset` a run boundary and return the rank at which a run
    /// starting at `offset` would be inserted.
    fn split_at(&mut self, offset: usize) -> usize {
        let Some(hit) = self.tree.seek(ByOffset(offset)) else {
            // At or past the tail: append position.
            return self.tree.len();
        };
        if hit.prefix.length == offset {
            return hit.rank;
        }
        let head = offset - hit.prefix.length;
        let split = self.tree.update(hit.rank, |run| {
            let tail = run.length - head;
            run.length = head;
            RangeRun::new(tail, run.value.clone())
        });
        if let Some(tail_run) = split {
            self.tree.insert(hit.rank + 1, tail_run);
        }
        hit.rank + 1
    }

    /// Remove the run span `[start, end)`, trimming boundary runs, and
    /// return the rank where replacement runs belong.
    fn carve(&mut self, start: usize, end: usize) -> usize {
        let Some(hit) = self.tree.seek(ByOffset(start)) else {
            return self.tree.len();
        };
        let run_start = hit.prefix.length;
        let rank = hit.rank;
        if run_start < start {
            let head = start - run_start;
            let run_length = self.tree.get(rank).map(|r| r.length).unwrap_or(0);
            let run_end = run_start + run_length;
            if run_end > end {
                // The replaced span is interior to one run: split head/tail.
                let tail = self.tree.update(rank, |run| {
                    let tail = run_end - end;
                    run.length = head;
                    RangeRun::new(tail, run.value.clone())
                });
                if let Some(tail_run) = tail {
                    self.tree.insert(rank + 1, tail_run);
                }
            } else {
                self.tree.update(rank, |run| run.length = head);
                self.remove_span(rank + 1, run_end, end);
            }
            rank + 1
        } else {
            self.remove_span(rank, run_start, end);
            rank
        }
    }

    /// Remove or trim runs beginning at `rank` (whose first run starts at
    /// `pos`) until `end` is reached.
    fn remove_span(&mut self, rank: usize, mut pos: usize, end: usize) {
        while pos < end {
            let Some(run_length) = self.tree.get(rank).map(|r| r.length) else {
                break;
            };
            if pos + run_length <= end {
                self.tree.remove(rank);
                pos += run_length;
            } else {
                let trim = end - pos;
                self.tree.update(rank, |run| run.length -= trim);
                break;
            }
        }
    }

    /// Pairwise-merge coalescable neighbors with ranks in `[from, to]`.
    fn coalesce_ranks(&mut self, from: usize, to: usize) {
        let mut rank = from;
        let mut limit = to;
        while rank < limit && rank + 1 < self.tree.len() {
            let merge = match (self.tree.get(rank), self.tree.get(rank + 1)) {
                (Some(a), Some(b)) => a.coalesces_with(b),
                _ => false,
            };
            if merge {
                if let Some(removed) = self.tree.remove(rank + 1) {
                    self.tree.update(rank, |run| run.length += removed.length);
                }
                limit = limit.saturating_sub(1);
            } else {
                rank += 1;
            }
        }
    }
}

impl<V: RangeValue + std::fmt::Debug> std::fmt::Debug for RangeStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tree.iter()).finish()
    }
}
