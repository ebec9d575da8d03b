//! Visual line fragments and the typesetting pass that produces them.
//!
//! A logical line is displayed as one or more visual fragments, each a
//! contiguous sub-range of the line that fits within a maximum width.
//! Measurement is a collaborator: the host supplies a [`TextMeasure`]
//! backed by its shaping engine, and [`MonospaceMeasure`] provides a
//! UAX #11 cell-based implementation so the model is testable headlessly.
//!
//! Layout is lazy. Each line carries a [`LineLayout`] state machine:
//! content, width, or font changes only flip it to `Dirty`; fragments are
//! recomputed when something actually asks for them.

use unicode_width::UnicodeWidthChar;

/// How many characters the word-break pass walks backward looking for a
/// whitespace or punctuation boundary before accepting a mid-word break.
pub const WORD_BREAK_LOOKBACK: usize = 100;

/// Where a line is allowed to break when it exceeds the maximum width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakStrategy {
    /// Prefer breaking after whitespace or punctuation, searching backward
    /// a bounded distance; falls back to a mid-word break when no boundary
    /// exists within the bound.
    #[default]
    Word,
    /// Break exactly where the width runs out. Never splits a `\r\n` pair.
    Character,
}

/// One visually wrapped sub-range of a logical line.
///
/// Fragments of a line are contiguous, non-overlapping, and their lengths
/// sum to the line's length (terminator included, carried by the final
/// fragment).
#[derive(Debug, Clone, PartialEq)]
pub struct LineFragment {
    /// Start of this fragment, in UTF-16 code units from the line start.
    pub offset_in_line: usize,
    /// Length in UTF-16 code units.
    pub length: usize,
    /// Measured width of the fragment's visible text.
    pub width: f64,
    /// Natural height reported by the measurer.
    pub height: f64,
    /// `height` multiplied by the line-height multiplier; this is the
    /// height the fragment occupies vertically.
    pub scaled_height: f64,
}

impl LineFragment {
    /// Exclusive end of this fragment, in UTF-16 code units from the line
    /// start.
    pub fn end(&self) -> usize {
        self.offset_in_line + self.length
    }
}

/// Host-supplied text measurement primitive.
pub trait TextMeasure {
    /// Horizontal advance of a single character.
    ///
    /// Line terminators are filtered out before measurement; they never
    /// contribute width.
    fn advance(&self, ch: char) -> f64;

    /// Natural (unscaled) height of one visual line.
    fn line_height(&self) -> f64;
}

/// Cell-based measurement: every character advances by its UAX #11 column
/// width times a fixed cell width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceMeasure {
    /// Width of one cell.
    pub cell_width: f64,
    /// Height of one visual line.
    pub line_height: f64,
}

impl MonospaceMeasure {
    /// Create a measurer with the given cell metrics.
    pub fn new(cell_width: f64, line_height: f64) -> Self {
        Self {
            cell_width,
            line_height,
        }
    }
}

impl Default for MonospaceMeasure {
    fn default() -> Self {
        Self::new(8.0, 16.0)
    }
}

impl TextMeasure for MonospaceMeasure {
    fn advance(&self, ch: char) -> f64 {
        UnicodeWidthChar::width(ch).unwrap_or(1) as f64 * self.cell_width
    }

    fn line_height(&self) -> f64 {
        self.line_height
    }
}

/// Everything the typesetting pass needs besides the text itself.
#[derive(Debug, Clone)]
pub struct LayoutOptions<M: TextMeasure> {
    /// Maximum fragment width; text wraps past this.
    pub max_width: f64,
    /// Break placement policy.
    pub strategy: BreakStrategy,
    /// Multiplier applied to the measurer's line height.
    pub line_height_multiplier: f64,
    /// The measurement collaborator.
    pub measure: M,
}

impl<M: TextMeasure> LayoutOptions<M> {
    /// Create layout options with a multiplier of 1.0.
    pub fn new(max_width: f64, strategy: BreakStrategy, measure: M) -> Self {
        Self {
            max_width,
            strategy,
            line_height_multiplier: 1.0,
            measure,
        }
    }

    /// Scaled height of one visual line under these options.
    pub fn scaled_line_height(&self) -> f64 {
        self.measure.line_height() * self.line_height_multiplier
    }
}

struct MeasuredChar {
    ch: char,
    advance: f64,
    utf16_len: usize,
}

/// Lay out one logical line (terminator included) into fragments.
///
/// A line that fits yields exactly one fragment; an empty line yields one
/// zero-length fragment carrying the line height, so every line occupies
/// vertical space.
pub fn layout_fragments<M: TextMeasure>(text: &str, options: &LayoutOptions<M>) -> Vec<LineFragment> {
    let height = options.measure.line_height();
    let scaled_height = height * options.line_height_multiplier;

    let chars: Vec<MeasuredChar> = text
        .chars()
        .map(|ch| MeasuredChar {
            ch,
            advance: if ch == '\n' || ch == '\r' {
                0.0
            } else {
                options.measure.advance(ch)
            },
            utf16_len: ch.len_utf16(),
        })
        .collect();

    let mut fragments = Vec::new();
    let mut frag_start = 0usize; // char index
    let mut frag_start_u16 = 0usize;
    let mut frag_width = 0.0f64;
    let mut i = 0usize;

    while i < chars.len() {
        let advance = chars[i].advance;
        if frag_width + advance > options.max_width && frag_width > 0.0 {
            let break_at = match options.strategy {
                BreakStrategy::Character => i,
                BreakStrategy::Word => word_break(&chars, frag_start, i),
            };
            // Never produce an empty fragment; a single oversized token
            // still occupies one fragment on its own.
            let break_at = if break_at <= frag_start { i } else { break_at };

            let (length_u16, width) = span_metrics(&chars, frag_start, break_at);
            fragments.push(LineFragment {
                offset_in_line: frag_start_u16,
                length: length_u16,
                width,
                height,
                scaled_height,
            });
            frag_start = break_at;
            frag_start_u16 += length_u16;
            // Characters between the break point and `i` already belong to
            // the new fragment.
            frag_width = span_metrics(&chars, break_at, i).1;
            continue;
        }
        frag_width += advance;
        i += 1;
    }

    let (length_u16, width) = span_metrics(&chars, frag_start, chars.len());
    fragments.push(LineFragment {
        offset_in_line: frag_start_u16,
        length: length_u16,
        width,
        height,
        scaled_height,
    });
    fragments
}

/// Find the break point for a fragment ending no later than `limit`,
/// walking backward from `limit` up to [`WORD_BREAK_LOOKBACK`] characters
/// for a position preceded by whitespace or punctuation.
///
/// Returns `limit` itself (a mid-word break) when no boundary is found
/// within the bound; boundedness wins over typographic correctness on
/// pathological single-token lines.
fn word_break(chars: &[MeasuredChar], frag_start: usize, limit: usize) -> usize {
    let floor = limit.saturating_sub(WORD_BREAK_LOOKBACK).max(frag_start);
    let mut candidate = limit;
    while candidate > floor {
        let prev = chars[candidate - 1].ch;
        if prev.is_whitespace() || prev.is_ascii_punctuation() {
            return candidate;
        }
        candidate -= 1;
    }
    limit
}

/// UTF-16 length and measured width of `chars[start..end)`.
fn span_metrics(chars: &[MeasuredChar], start: usize, end: usize) -> (usize, f64) {
    let mut length = 0usize;
    let mut width = 0.0f64;
    for mc in &chars[start..end] {
        length += mc.utf16_len;
        width += mc.advance;
    }
    (length, width)
}

/// Per-line layout cache.
///
/// `Dirty` until something forces a measurement pass; any content, width,
/// or font change flips it back to `Dirty` without recomputing.
#[derive(Debug, Clone, Default)]
pub enum LineLayout {
    /// Fragments must be recomputed before use.
    #[default]
    Dirty,
    /// Fragments are current for the line's text and the last-used options.
    Clean(Vec<LineFragment>),
}

impl LineLayout {
    /// `true` when fragments need recomputation.
    pub fn is_dirty(&self) -> bool {
        matches!(self, LineLayout::Dirty)
    }

    /// Drop cached fragments.
    pub fn invalidate(&mut self) {
        *self = LineLayout::Dirty;
    }

    /// Cached fragments, if current.
    pub fn fragments(&self) -> Option<&[LineFragment]> {
        match self {
            LineLayout::Dirty => None,
            LineLayout::Clean(fragments) => Some(fragments),
        }
    }

    /// Fragments for `text`, recomputing only when dirty. Returns the
    /// fragments and whether a measurement pass ran.
    pub fn ensure<M: TextMeasure>(
        &mut self,
        text: &str,
        options: &LayoutOptions<M>,
    ) -> (&[LineFragment], bool) {
        let recomputed = self.is_dirty();
        if recomputed {
            *self = LineLayout::Clean(layout_fragments(text, options));
        }
        match self {
            LineLayout::Clean(fragments) => (fragments.as_slice(), recomputed),
            LineLayout::Dirty => unreachable!("layout ensured above"),
        }
    }
}
