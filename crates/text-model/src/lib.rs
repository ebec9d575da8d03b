#![warn(missing_docs)]
//! Text Model - Headless Document Model for Code Editors
//!
//! # Overview
//!
//! `text-model` is the document core of a code editor: the text's logical
//! lines, their wrapped visual fragments, per-character attribute runs, and
//! the selection set, kept synchronized under arbitrary edits. It does not
//! render anything and owns no text buffer; the host feeds it edits and
//! asks it coordinate questions.
//!
//! # Core Features
//!
//! - **Fast Line Lookup**: augmented red-black tree, O(log n) queries by
//!   character offset or vertical pixel position
//! - **Incremental Relayout**: per-line lazy fragment cache, only edited
//!   lines are re-measured
//! - **Attribute Runs**: run-length encoded store with adjacent-run
//!   coalescing, O(log n + k) range queries
//! - **Multi-Cursor Selections**: sorted, merged, rebased across every edit
//! - **Incremental Re-Highlighting**: generation-checked highlight queries,
//!   stale responses superseded rather than merged
//!
//! # Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Edit Coordinator (EditCoordinator)         │  ← Public API
//! ├──────────────┬───────────────┬──────────────┤
//! │ Line Storage │  Range Store  │  Selections  │  ← The three stores
//! ├──────────────┴───────────────┴──────────────┤
//! │  Typesetting (fragments, break strategies)  │  ← Lazy layout
//! ├─────────────────────────────────────────────┤
//! │  Summary Tree (augmented red-black arena)   │  ← Shared skeleton
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## Driving the Coordinator
//!
//! ```rust
//! use text_model::{EditCoordinator, TextEdit};
//!
//! let mut model: EditCoordinator<u32> =
//!     EditCoordinator::new("fn main() {\n    body\n}\n", 16.0);
//!
//! // The host buffer applied an edit; mirror it into the model.
//! model.apply_edit(&TextEdit::insertion(3, "x"));
//! assert_eq!(model.len(), 24);
//!
//! // Which line contains offset 5?
//! let line = model.line_storage().line_at_offset(5).unwrap();
//! assert_eq!(line.index, 0);
//! assert_eq!(line.offset, 0);
//! ```
//!
//! ## Attribute Runs
//!
//! ```rust
//! use text_model::RangeStore;
//!
//! let mut store: RangeStore<u32> = RangeStore::new(14);
//! store.set_value(Some(7), 2..5);
//! store.set_value(Some(7), 5..8);
//!
//! // Adjacent equal runs coalesce into one.
//! let (range, value) = store.run_at(4).unwrap();
//! assert_eq!(range, 2..8);
//! assert_eq!(value, Some(7));
//! ```
//!
//! # Module Description
//!
//! - [`tree`] - Augmented red-black tree shared by both stores
//! - [`line_storage`] - Logical lines keyed by offset and height
//! - [`fragment`] - Visual fragments and the typesetting pass
//! - [`range_store`] - Run-length encoded attribute storage
//! - [`selection`] - Selection set and caret movement
//! - [`coordinator`] - Edit fan-out and highlight synchronization
//! - [`delta`] - The edit shape and UTF-16 offset helpers
//!
//! # Coordinate Systems
//!
//! All offsets are UTF-16 code units over a single space `[0, N)` shared by
//! every store; the model also answers by line/column (via line positions)
//! and by vertical pixel position (via the height aggregate). The three
//! stores always agree on `N` after every edit.
//!
//! # Threading
//!
//! The stores are not internally synchronized. Mutate them from one logical
//! thread and marshal asynchronous highlight completions back to it; see
//! [`EditCoordinator::complete_highlight`] for the supersede policy.

pub mod coordinator;
pub mod delta;
pub mod fragment;
pub mod line_storage;
pub mod range_store;
pub mod selection;
pub mod tree;

pub use coordinator::{EditCoordinator, HighlightProvider, HighlightQuery};
pub use delta::{
    TextEdit, byte_for_utf16, line_lengths_utf16, terminator_ends_utf16, utf16_for_byte, utf16_len,
};
pub use fragment::{
    BreakStrategy, LayoutOptions, LineFragment, LineLayout, MonospaceMeasure, TextMeasure,
    layout_fragments,
};
pub use line_storage::{Line, LineCursor, LinePosition, LineStorage, LineSummary};
pub use range_store::{RangeRun, RangeStore, RangeValue};
pub use selection::{
    Destination, Direction, SelectionSet, TextSelection, range_of_selection, vertical_destination,
};
pub use tree::{Dimension, SeekHit, Summarize, Summary, SummaryTree};
