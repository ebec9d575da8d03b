//! Logical line storage.
//!
//! One node per newline-delimited line, held in the augmented tree so that
//! both "which line contains code-unit offset o" and "which line contains
//! vertical position y" resolve in O(log n). Line lengths include the
//! terminator; the sum of all lengths is the document length, and the sum
//! of all heights is the document's rendered height.

use std::ops::{AddAssign, Range};

use crate::fragment::{LayoutOptions, LineFragment, LineLayout, TextMeasure};
use crate::tree::{Dimension, Summarize, Summary, SummaryTree, TreeIter};

/// A logical line: cached length/height plus its lazy fragment layout.
#[derive(Debug, Default)]
pub struct Line {
    /// Length in UTF-16 code units, terminator included.
    pub length: usize,
    /// Cached total height of the line's visual fragments.
    pub height: f64,
    /// Lazily computed fragment layout.
    pub layout: LineLayout,
}

impl Line {
    /// Create a line that has not been laid out yet.
    pub fn new(length: usize, height: f64) -> Self {
        Self {
            length,
            height,
            layout: LineLayout::Dirty,
        }
    }
}

/// Aggregates maintained per subtree: line count, total length, total
/// height.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineSummary {
    /// Number of lines.
    pub count: usize,
    /// Total length in UTF-16 code units.
    pub length: usize,
    /// Total fragment height.
    pub height: f64,
}

impl AddAssign<&LineSummary> for LineSummary {
    fn add_assign(&mut self, other: &LineSummary) {
        self.count += other.count;
        self.length += other.length;
        self.height += other.height;
    }
}

impl Summary for LineSummary {
    fn count(&self) -> usize {
        self.count
    }
}

impl Summarize for Line {
    type Summary = LineSummary;

    fn summary(&self) -> LineSummary {
        LineSummary {
            count: 1,
            length: self.length,
            height: self.height,
        }
    }
}

/// Seek dimension: UTF-16 code-unit offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct ByOffset(pub usize);

impl Dimension<LineSummary> for ByOffset {
    fn from_summary(summary: &LineSummary) -> Self {
        ByOffset(summary.length)
    }
}

/// Seek dimension: accumulated height.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct ByY(pub f64);

impl Dimension<LineSummary> for ByY {
    fn from_summary(summary: &LineSummary) -> Self {
        ByY(summary.height)
    }
}

/// A resolved line: its index, start offset, extent, and vertical placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePosition {
    /// Zero-based line index.
    pub index: usize,
    /// Start offset in UTF-16 code units.
    pub offset: usize,
    /// Length in UTF-16 code units, terminator included.
    pub length: usize,
    /// Cached line height.
    pub height: f64,
    /// Vertical position of the line's top edge.
    pub y: f64,
}

impl LinePosition {
    /// The line's half-open offset range.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.length
    }
}

/// Balanced store of the document's logical lines.
pub struct LineStorage {
    tree: SummaryTree<Line>,
}

impl Default for LineStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl LineStorage {
    /// Create an empty store (no lines at all).
    pub fn new() -> Self {
        Self {
            tree: SummaryTree::new(),
        }
    }

    /// Bulk-build from ordered line lengths in O(n); every subtree
    /// aggregate is exact, not approximated.
    pub fn build(lengths: impl IntoIterator<Item = usize>, estimated_line_height: f64) -> Self {
        Self {
            tree: SummaryTree::from_items(
                lengths
                    .into_iter()
                    .map(|length| Line::new(length, estimated_line_height)),
            ),
        }
    }

    /// Total document length in UTF-16 code units.
    pub fn len(&self) -> usize {
        self.tree.summary().length
    }

    /// `true` when the store holds no lines.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Number of logical lines.
    pub fn count(&self) -> usize {
        self.tree.len()
    }

    /// Total rendered height of the document.
    pub fn total_height(&self) -> f64 {
        self.tree.summary().height
    }

    /// The line whose `[start, start+length)` span contains `offset`, or
    /// `None` when `offset` is outside `[0, len)`.
    pub fn line_at_offset(&self, offset: usize) -> Option<LinePosition> {
        let hit = self.tree.seek(ByOffset(offset))?;
        let line = self.tree.get(hit.rank)?;
        Some(LinePosition {
            index: hit.rank,
            offset: hit.prefix.length,
            length: line.length,
            height: line.height,
            y: hit.prefix.height,
        })
    }

    /// The line whose vertical span contains `y`, or `None` when `y` is
    /// outside `[0, total_height)`.
    pub fn line_at_y(&self, y: f64) -> Option<LinePosition> {
        if y < 0.0 {
            return None;
        }
        let hit = self.tree.seek(ByY(y))?;
        let line = self.tree.get(hit.rank)?;
        Some(LinePosition {
            index: hit.rank,
            offset: hit.prefix.length,
            length: line.length,
            height: line.height,
            y: hit.prefix.height,
        })
    }

    /// The line at `index`, or `None` when `index >= count()`.
    pub fn line_at_index(&self, index: usize) -> Option<LinePosition> {
        let line = self.tree.get(index)?;
        let prefix = self.tree.prefix_summary(index);
        Some(LinePosition {
            index,
            offset: prefix.length,
            length: line.length,
            height: line.height,
            y: prefix.height,
        })
    }

    /// The final line, if any. Useful for end-of-document carets, where
    /// `offset == len()` falls outside every line's half-open span.
    pub fn last_line(&self) -> Option<LinePosition> {
        self.line_at_index(self.count().checked_sub(1)?)
    }

    /// Insert a new logical line starting at `offset`; O(log n).
    ///
    /// `offset` must be an existing line boundary (or the document end).
    pub fn insert(&mut self, offset: usize, length: usize, height: f64) {
        let index = if offset >= self.len() {
            debug_assert!(offset == self.len(), "insert offset beyond document end");
            self.count()
        } else {
            let hit = match self.tree.seek(ByOffset(offset)) {
                Some(hit) => hit,
                None => return,
            };
            debug_assert!(
                hit.prefix.length == offset,
                "insert offset must fall on a line boundary"
            );
            hit.rank
        };
        self.tree.insert(index, Line::new(length, height));
    }

    /// Insert a new logical line at `index`; O(log n).
    pub fn insert_at(&mut self, index: usize, length: usize, height: f64) {
        self.tree.insert(index.min(self.count()), Line::new(length, height));
    }

    /// Remove the line containing `offset`; O(log n). Returns `false` when
    /// no line contains it.
    pub fn remove(&mut self, offset: usize) -> bool {
        match self.tree.seek(ByOffset(offset)) {
            Some(hit) => self.tree.remove(hit.rank).is_some(),
            None => false,
        }
    }

    /// Remove the line at `index`; O(log n).
    pub fn remove_at(&mut self, index: usize) -> Option<Line> {
        self.tree.remove(index)
    }

    /// Adjust the cached length/height of the line containing `offset`
    /// without changing the line count; O(log n).
    pub fn update(&mut self, offset: usize, length_delta: isize, height_delta: f64) -> bool {
        let Some(hit) = self.tree.seek(ByOffset(offset)) else {
            debug_assert!(offset <= self.len(), "update offset beyond document end");
            return false;
        };
        self.update_at(hit.rank, length_delta, height_delta)
    }

    /// Adjust the line at `index` by the given deltas; O(log n).
    pub fn update_at(&mut self, index: usize, length_delta: isize, height_delta: f64) -> bool {
        self.tree
            .update(index, |line| {
                let new_length = line.length as isize + length_delta;
                debug_assert!(new_length >= 0, "line length underflow");
                line.length = new_length.max(0) as usize;
                line.height += height_delta;
                line.layout.invalidate();
            })
            .is_some()
    }

    /// Mutate the line at `index` arbitrarily; summaries re-propagate.
    pub fn with_line_mut<R>(&mut self, index: usize, f: impl FnOnce(&mut Line) -> R) -> Option<R> {
        self.tree.update(index, f)
    }

    /// Cached fragments of the line at `index`, when clean.
    pub fn fragments_at(&self, index: usize) -> Option<&[LineFragment]> {
        self.tree.get(index)?.layout.fragments()
    }

    /// Recompute the fragments of the line at `index` from `line_text` if
    /// its layout is dirty, refreshing the cached height. Returns `true`
    /// when a measurement pass ran.
    pub fn ensure_layout<M: TextMeasure>(
        &mut self,
        index: usize,
        line_text: &str,
        options: &LayoutOptions<M>,
    ) -> bool {
        let mut recomputed = false;
        self.tree.update(index, |line| {
            let (fragments, ran) = line.layout.ensure(line_text, options);
            if ran {
                line.height = fragments.iter().map(|f| f.scaled_height).sum();
            }
            recomputed = ran;
        });
        recomputed
    }

    /// Mark the line containing `offset` as needing layout.
    pub fn mark_dirty(&mut self, offset: usize) {
        if let Some(hit) = self.tree.seek(ByOffset(offset)) {
            self.tree.update(hit.rank, |line| line.layout.invalidate());
        }
    }

    /// Mark every line as needing layout (width, font, or wrap change).
    pub fn mark_all_dirty(&mut self) {
        self.tree.for_each_mut(|line| line.layout.invalidate());
    }

    /// Iterate all lines in order.
    pub fn iter(&self) -> LineCursor<'_> {
        self.cursor_from_index(0, None, None)
    }

    /// Lazily iterate the lines intersecting `range`.
    ///
    /// O(log n) to find the entry point, then O(1) amortized per line. The
    /// cursor borrows the store and is valid only for its current state.
    pub fn lines_in_range(&self, range: Range<usize>) -> LineCursor<'_> {
        match self.tree.seek(ByOffset(range.start)) {
            Some(hit) => self.cursor_from_hit(hit.rank, hit.prefix, Some(range.end), None),
            None => self.cursor_from_index(self.count(), None, None),
        }
    }

    /// Lazily iterate the lines intersecting the vertical span `range`.
    pub fn lines_in_y_range(&self, range: Range<f64>) -> LineCursor<'_> {
        match self.tree.seek(ByY(range.start.max(0.0))) {
            Some(hit) => self.cursor_from_hit(hit.rank, hit.prefix, None, Some(range.end)),
            None => self.cursor_from_index(self.count(), None, None),
        }
    }

    fn cursor_from_hit(
        &self,
        rank: usize,
        prefix: LineSummary,
        end_offset: Option<usize>,
        end_y: Option<f64>,
    ) -> LineCursor<'_> {
        LineCursor {
            inner: self.tree.iter_from(rank),
            index: rank,
            offset: prefix.length,
            y: prefix.height,
            end_offset,
            end_y,
        }
    }

    fn cursor_from_index(
        &self,
        index: usize,
        end_offset: Option<usize>,
        end_y: Option<f64>,
    ) -> LineCursor<'_> {
        let prefix = self.tree.prefix_summary(index.min(self.count()));
        LineCursor {
            inner: self.tree.iter_from(index),
            index,
            offset: prefix.length,
            y: prefix.height,
            end_offset,
            end_y,
        }
    }
}

impl std::fmt::Debug for LineStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineStorage")
            .field("count", &self.count())
            .field("len", &self.len())
            .field("total_height", &self.total_height())
            .finish()
    }
}

/// Forward cursor over lines, carrying each line's start offset and top
/// edge as it walks.
pub struct LineCursor<'a> {
    inner: TreeIter<'a, Line>,
    index: usize,
    offset: usize,
    y: f64,
    end_offset: Option<usize>,
    end_y: Option<f64>,
}

impl Iterator for LineCursor<'_> {
    type Item = LinePosition;

    fn next(&mut self) -> Option<LinePosition> {
        if let Some(end) = self.end_offset {
            if self.offset >= end {
                return None;
            }
        }
        if let Some(end) = self.end_y {
            if self.y >= end {
                return None;
            }
        }
        let line = self.inner.next()?;
        let position = LinePosition {
            index: self.index,
            offset: self.offset,
            length: line.length,
            height: line.height,
            y: self.y,
        };
        self.index += 1;
        self.offset += line.length;
        self.y += line.height;
        Some(position)
    }
}
