//! Selections and caret movement.
//!
//! A document holds a set of offset ranges (`length == 0` is a caret);
//! every edit rebases the whole set so that no range ever points outside
//! the document. Movement targets (character, word, line, visual line,
//! document) are computed here; vertical movement keeps the caret's
//! horizontal position stable across lines of different lengths via a
//! per-selection suggested x.

use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;

use crate::delta::{byte_for_utf16, utf16_len};
use crate::fragment::{LayoutOptions, TextMeasure};
use crate::line_storage::{LinePosition, LineStorage};

/// Direction of a selection movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward the end of the document.
    Forward,
    /// Toward the start of the document.
    Backward,
    /// One visual line up.
    Up,
    /// One visual line down.
    Down,
}

/// Granularity of a selection movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// One grapheme cluster.
    Character,
    /// The next/previous word boundary.
    Word,
    /// The line's content end (forward) or its start (backward, with
    /// smart-home behavior).
    Line,
    /// One wrapped visual line (vertical movement).
    VisualLine,
    /// The document start or end.
    Document,
}

/// One selection: a half-open offset range plus the remembered horizontal
/// position used to keep vertical caret movement visually stable.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSelection {
    /// The selected range; `start == end` is a caret.
    pub range: Range<usize>,
    /// Horizontal pixel position to aim for on vertical movement. `None`
    /// means "derive from the current location on the next move".
    pub suggested_x: Option<f64>,
}

impl TextSelection {
    /// A caret at `offset`.
    pub fn caret(offset: usize) -> Self {
        Self {
            range: offset..offset,
            suggested_x: None,
        }
    }

    /// A range selection.
    pub fn new(range: Range<usize>) -> Self {
        Self {
            range,
            suggested_x: None,
        }
    }

    /// `true` when the selection is a caret.
    pub fn is_caret(&self) -> bool {
        self.range.is_empty()
    }
}

/// The document's set of concurrent selections.
///
/// Kept sorted and non-overlapping; there is always at least one selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSet {
    selections: Vec<TextSelection>,
}

impl Default for SelectionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionSet {
    /// A single caret at the document start.
    pub fn new() -> Self {
        Self {
            selections: vec![TextSelection::caret(0)],
        }
    }

    /// Current selections, sorted by start offset.
    pub fn selections(&self) -> &[TextSelection] {
        &self.selections
    }

    /// Replace the whole set with a single range. The suggested horizontal
    /// position is recomputed (lazily) from the new location.
    pub fn set_selected_range(&mut self, range: Range<usize>) {
        self.selections = vec![TextSelection::new(range)];
    }

    /// Replace the whole set with multiple ranges (multi-cursor editing);
    /// ranges are sorted, overlapping ones merged, duplicates dropped.
    pub fn set_selected_ranges(&mut self, ranges: impl IntoIterator<Item = Range<usize>>) {
        self.selections = ranges.into_iter().map(TextSelection::new).collect();
        if self.selections.is_empty() {
            self.selections.push(TextSelection::caret(0));
        }
        self.normalize();
    }

    /// Rebase every selection across an edit that replaced `replaced`
    /// (pre-edit coordinates) with `inserted_len` code units.
    ///
    /// Ranges entirely before the edit are untouched; ranges overlapping it
    /// collapse to a caret at the edit boundary (start on shrink, end of
    /// the insertion on growth); ranges after it shift by the delta and
    /// collapse unless `retain_length` is set (programmatic edits such as
    /// autocomplete insertion).
    pub fn apply_edit(&mut self, replaced: Range<usize>, inserted_len: usize, retain_length: bool) {
        let delta = inserted_len as isize - replaced.len() as isize;
        for selection in &mut self.selections {
            let (start, end) = (selection.range.start, selection.range.end);
            let strictly_before = end < replaced.start || (start < end && end == replaced.start);
            if strictly_before {
                continue;
            }
            if start >= replaced.end {
                let new_start = (start as isize + delta).max(replaced.start as isize) as usize;
                if retain_length {
                    let new_end = (end as isize + delta).max(new_start as isize) as usize;
                    selection.range = new_start..new_end;
                } else {
                    selection.range = new_start..new_start;
                }
            } else {
                let caret = if delta < 0 {
                    replaced.start
                } else {
                    replaced.start + inserted_len
                };
                selection.range = caret..caret;
            }
            selection.suggested_x = None;
        }
        self.normalize();
    }

    /// Move every caret one visual line up or down, remembering the
    /// horizontal position across consecutive moves.
    pub fn move_carets_vertically<M: TextMeasure>(
        &mut self,
        text: &str,
        lines: &mut LineStorage,
        direction: Direction,
        options: &LayoutOptions<M>,
    ) {
        debug_assert!(matches!(direction, Direction::Up | Direction::Down));
        for selection in &mut self.selections {
            let origin = match direction {
                Direction::Up => selection.range.start,
                _ => selection.range.end,
            };
            let (target, x) =
                vertical_destination(text, lines, origin, direction, selection.suggested_x, options);
            selection.range = target..target;
            selection.suggested_x = Some(x);
        }
        self.normalize();
    }

    /// Sort, merge overlapping ranges, and drop duplicates. Adjacent
    /// ranges that merely touch are not merged.
    fn normalize(&mut self) {
        self.selections
            .sort_by_key(|s| (s.range.start, s.range.end));
        let mut merged: Vec<TextSelection> = Vec::with_capacity(self.selections.len());
        for selection in self.selections.drain(..) {
            match merged.last_mut() {
                Some(last) if selection.range == last.range => {}
                Some(last) if selection.range.start < last.range.end => {
                    last.range.end = last.range.end.max(selection.range.end);
                    last.suggested_x = None;
                }
                _ => merged.push(selection),
            }
        }
        self.selections = merged;
    }
}

/// The candidate range for moving or extending a selection anchored at
/// `offset` one step in `direction` toward `destination`.
///
/// Covers the horizontal granularities; [`Direction::Up`]/[`Direction::Down`]
/// with [`Destination::VisualLine`] go through [`vertical_destination`],
/// which needs layout and measurement context.
pub fn range_of_selection(
    text: &str,
    lines: &LineStorage,
    offset: usize,
    direction: Direction,
    destination: Destination,
) -> Range<usize> {
    let target = match (direction, destination) {
        (Direction::Forward, Destination::Character) => next_character(text, offset),
        (Direction::Backward, Destination::Character) => prev_character(text, offset),
        (Direction::Forward, Destination::Word) => next_word_boundary(text, offset),
        (Direction::Backward, Destination::Word) => prev_word_boundary(text, offset),
        (Direction::Forward, Destination::Line | Destination::VisualLine) => {
            line_content_end(text, lines, offset)
        }
        (Direction::Backward, Destination::Line | Destination::VisualLine) => {
            home_offset(text, lines, offset)
        }
        (Direction::Forward, Destination::Document) => utf16_len(text),
        (Direction::Backward, Destination::Document) => 0,
        (Direction::Up | Direction::Down, _) => offset,
    };
    offset.min(target)..offset.max(target)
}

/// Offset after the grapheme cluster at `offset` (a `\r\n` pair and a
/// surrogate-pair emoji each count as one step).
pub fn next_character(text: &str, offset: usize) -> usize {
    let byte = byte_for_utf16(text, offset);
    match text[byte..].graphemes(true).next() {
        Some(grapheme) => offset + utf16_len(grapheme),
        None => offset,
    }
}

/// Offset before the grapheme cluster ending at `offset`.
pub fn prev_character(text: &str, offset: usize) -> usize {
    let byte = byte_for_utf16(text, offset);
    match text[..byte].graphemes(true).next_back() {
        Some(grapheme) => offset.saturating_sub(utf16_len(grapheme)),
        None => 0,
    }
}

fn is_word_segment(segment: &str) -> bool {
    segment.chars().next().is_some_and(|ch| ch.is_alphanumeric())
}

/// End of the word at or after `offset`: the next transition out of an
/// alphanumeric run.
pub fn next_word_boundary(text: &str, offset: usize) -> usize {
    let byte = byte_for_utf16(text, offset);
    let mut units = 0usize;
    for (segment_start, segment) in text.split_word_bound_indices() {
        let segment_units = utf16_len(segment);
        let segment_end = segment_start + segment.len();
        if segment_end > byte && is_word_segment(segment) {
            return units + segment_units;
        }
        units += segment_units;
    }
    utf16_len(text)
}

/// Start of the word at or before `offset`: the previous transition into
/// an alphanumeric run.
pub fn prev_word_boundary(text: &str, offset: usize) -> usize {
    let byte = byte_for_utf16(text, offset);
    let mut result = 0usize;
    let mut units = 0usize;
    let mut found = false;
    for (segment_start, segment) in text.split_word_bound_indices() {
        if segment_start >= byte {
            break;
        }
        if is_word_segment(segment) {
            result = units;
            found = true;
        }
        units += utf16_len(segment);
    }
    if found { result } else { 0 }
}

fn line_of(lines: &LineStorage, offset: usize) -> Option<LinePosition> {
    lines.line_at_offset(offset).or_else(|| lines.last_line())
}

fn line_text<'a>(text: &'a str, line: &LinePosition) -> &'a str {
    let start = byte_for_utf16(text, line.offset);
    let end = byte_for_utf16(text, line.offset + line.length);
    &text[start..end]
}

fn terminator_units(line_text: &str) -> usize {
    if line_text.ends_with("\r\n") {
        2
    } else if line_text.ends_with('\n') || line_text.ends_with('\r') {
        1
    } else {
        0
    }
}

/// Offset of the last content character boundary of the line containing
/// `offset` (the position just before the terminator).
pub fn line_content_end(text: &str, lines: &LineStorage, offset: usize) -> usize {
    let Some(line) = line_of(lines, offset) else {
        return offset;
    };
    line.offset + line.length - terminator_units(line_text(text, &line))
}

/// Smart-home target for the line containing `offset`: the line start, or
/// the first non-whitespace column when already at the line start (the
/// second of two consecutive calls lands there).
pub fn home_offset(text: &str, lines: &LineStorage, offset: usize) -> usize {
    let Some(line) = line_of(lines, offset) else {
        return 0;
    };
    if offset != line.offset {
        return line.offset;
    }
    let slice = line_text(text, &line);
    let content_units = utf16_len(slice) - terminator_units(slice);
    let mut indent = 0usize;
    for ch in slice.chars() {
        if indent >= content_units || !ch.is_whitespace() {
            break;
        }
        indent += ch.len_utf16();
    }
    line.offset + indent.min(content_units)
}

/// Target offset and horizontal position for moving a caret at `offset`
/// one visual line up or down.
///
/// Uses the line's fragment layout (computing it if dirty) to walk between
/// wrapped rows; `suggested_x` pins the horizontal position across a run
/// of consecutive vertical moves. Moving up from the first visual line
/// lands on the document start; moving down from the last lands on the
/// document end.
pub fn vertical_destination<M: TextMeasure>(
    text: &str,
    lines: &mut LineStorage,
    offset: usize,
    direction: Direction,
    suggested_x: Option<f64>,
    options: &LayoutOptions<M>,
) -> (usize, f64) {
    let Some(line) = line_of(lines, offset) else {
        return (offset, suggested_x.unwrap_or(0.0));
    };
    let slice = line_text(text, &line);
    lines.ensure_layout(line.index, slice, options);

    let column = offset.saturating_sub(line.offset).min(line.length);
    let (fragment_index, fragment_count) = {
        let fragments = lines.fragments_at(line.index).unwrap_or(&[]);
        let idx = fragments
            .iter()
            .position(|f| column < f.end())
            .unwrap_or(fragments.len().saturating_sub(1));
        (idx, fragments.len())
    };
    let x = suggested_x.unwrap_or_else(|| {
        x_in_fragment(text, lines, &line, fragment_index, column, options)
    });

    let up = matches!(direction, Direction::Up);
    let (target_line, target_fragment) = if up {
        if fragment_index > 0 {
            (line, fragment_index - 1)
        } else if line.index > 0 {
            let Some(prev) = lines.line_at_index(line.index - 1) else {
                return (0, x);
            };
            let prev_slice = line_text(text, &prev);
            lines.ensure_layout(prev.index, prev_slice, options);
            let count = lines.fragments_at(prev.index).map_or(1, |f| f.len());
            (prev, count.saturating_sub(1))
        } else {
            return (0, x);
        }
    } else if fragment_index + 1 < fragment_count {
        (line, fragment_index + 1)
    } else if line.index + 1 < lines.count() {
        let Some(next) = lines.line_at_index(line.index + 1) else {
            return (lines.len(), x);
        };
        let next_slice = line_text(text, &next);
        lines.ensure_layout(next.index, next_slice, options);
        (next, 0)
    } else {
        return (lines.len(), x);
    };

    let target = offset_for_x(text, lines, &target_line, target_fragment, x, options);
    (target, x)
}

/// Horizontal position of `column` (line-relative units) inside the given
/// fragment, measured from the fragment's left edge.
fn x_in_fragment<M: TextMeasure>(
    text: &str,
    lines: &LineStorage,
    line: &LinePosition,
    fragment_index: usize,
    column: usize,
    options: &LayoutOptions<M>,
) -> f64 {
    let Some(fragments) = lines.fragments_at(line.index) else {
        return 0.0;
    };
    let Some(fragment) = fragments.get(fragment_index) else {
        return 0.0;
    };
    let start = byte_for_utf16(text, line.offset + fragment.offset_in_line);
    let end = byte_for_utf16(text, line.offset + fragment.end());
    let mut x = 0.0f64;
    let mut units = fragment.offset_in_line;
    for ch in text[start..end].chars() {
        if units >= column {
            break;
        }
        if ch != '\n' && ch != '\r' {
            x += options.measure.advance(ch);
        }
        units += ch.len_utf16();
    }
    x
}

/// Offset within the given fragment whose horizontal position is nearest
/// to `x`, never landing past the fragment's content (terminator excluded).
fn offset_for_x<M: TextMeasure>(
    text: &str,
    lines: &LineStorage,
    line: &LinePosition,
    fragment_index: usize,
    x: f64,
    options: &LayoutOptions<M>,
) -> usize {
    let Some(fragments) = lines.fragments_at(line.index) else {
        return line.offset;
    };
    let Some(fragment) = fragments.get(fragment_index) else {
        return line.offset;
    };
    let start = byte_for_utf16(text, line.offset + fragment.offset_in_line);
    let end = byte_for_utf16(text, line.offset + fragment.end());
    let mut acc = 0.0f64;
    let mut units = fragment.offset_in_line;
    for ch in text[start..end].chars() {
        if ch == '\n' || ch == '\r' {
            break;
        }
        let advance = options.measure.advance(ch);
        if acc + advance / 2.0 > x {
            break;
        }
        acc += advance;
        units += ch.len_utf16();
    }
    line.offset + units
}
