use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use text_model::{
    BreakStrategy, Destination, Direction, EditCoordinator, LayoutOptions, LineStorage,
    MonospaceMeasure, TextEdit, line_lengths_utf16, range_of_selection,
};

type Model = EditCoordinator<u32>;

fn ranges(model: &Model) -> Vec<std::ops::Range<usize>> {
    model
        .selections()
        .selections()
        .iter()
        .map(|s| s.range.clone())
        .collect()
}

#[test]
fn test_selection_overlapping_a_deletion_collapses_to_its_start() {
    // Selection [5,10) with an edit deleting [3,12) (delta -9) must end up
    // as the caret at 3.
    let mut model = Model::new("aaaaaaaaaaaaaaaa\n", 16.0);
    model.set_selected_range(5..10);
    model.apply_edit(&TextEdit::deletion(3..12));
    assert_eq!(ranges(&model), vec![3..3]);
}

#[test]
fn test_selection_overlapping_an_insertion_collapses_to_its_end() {
    let mut model = Model::new("aaaaaaaaaaaaaaaa\n", 16.0);
    model.set_selected_range(5..10);
    model.apply_edit(&TextEdit::new(4..6, "1234567"));
    assert_eq!(ranges(&model), vec![11..11]);
}

#[test]
fn test_typing_at_a_caret_carries_it_along() {
    let mut model = Model::new("hello\n", 16.0);
    model.set_selected_range(5..5);
    model.apply_edit(&TextEdit::insertion(5, ", world"));
    assert_eq!(ranges(&model), vec![12..12]);
}

#[test]
fn test_programmatic_edit_retains_a_following_selection() {
    let mut model = Model::new("hello world\n", 16.0);
    model.set_selected_range(6..11);

    // An autocomplete-style insertion before the selection keeps it a
    // range; a user edit would collapse it.
    model.apply_edit_retaining_selections(&TextEdit::insertion(0, ">> "));
    assert_eq!(ranges(&model), vec![9..14]);

    model.apply_edit(&TextEdit::insertion(0, "x"));
    assert_eq!(ranges(&model), vec![10..10]);
}

#[test]
fn test_multi_cursor_edit_rebases_every_selection() {
    let mut model = Model::new("one two three four\n", 16.0);
    model.set_selected_ranges([0..3, 4..7, 8..13, 14..18]);
    // Replace "two" with a longer word: [4,7) overlaps, later ranges shift.
    model.apply_edit(&TextEdit::new(4..7, "twelve"));
    assert_eq!(ranges(&model), vec![0..3, 10..10, 11..11, 17..17]);
}

#[test]
fn test_selections_never_escape_the_document() {
    let mut rng = StdRng::seed_from_u64(0x5e1ec7);
    let mut model = Model::new("alpha\nbeta\ngamma\ndelta\n", 16.0);

    for step in 0..200 {
        let len = model.len();
        if step % 5 == 0 {
            let a = rng.gen_range(0..=len);
            let b = rng.gen_range(0..=len);
            model.set_selected_ranges([a.min(b)..a.max(b), rng.gen_range(0..=len)..len]);
        }
        let edit = if len == 0 || rng.gen_bool(0.6) {
            TextEdit::insertion(rng.gen_range(0..=len), "ab\ncd")
        } else {
            let start = rng.gen_range(0..len);
            TextEdit::deletion(start..rng.gen_range(start..=len.min(start + 9)))
        };
        model.apply_edit(&edit);

        let len = model.len();
        for selection in model.selections().selections() {
            assert!(selection.range.start <= selection.range.end);
            assert!(selection.range.end <= len, "selection escaped the document");
        }
    }
}

#[test]
fn test_word_and_line_movement_targets() {
    let text = "    let total = 0;\nnext\n";
    let lines = LineStorage::build(line_lengths_utf16(text), 16.0);

    // Extending backward by word from inside "total" reaches its start.
    assert_eq!(
        range_of_selection(text, &lines, 11, Direction::Backward, Destination::Word),
        8..11
    );
    // Forward to the line end stops before the terminator.
    assert_eq!(
        range_of_selection(text, &lines, 11, Direction::Forward, Destination::Line),
        11..18
    );
    // Home goes to column 0 first, then to the first non-whitespace column.
    assert_eq!(
        range_of_selection(text, &lines, 11, Direction::Backward, Destination::Line),
        0..11
    );
    assert_eq!(
        range_of_selection(text, &lines, 0, Direction::Backward, Destination::Line),
        0..4
    );
    // Document boundaries.
    assert_eq!(
        range_of_selection(text, &lines, 11, Direction::Forward, Destination::Document),
        11..24
    );
}

#[test]
fn test_vertical_caret_movement_through_the_coordinator() {
    let text = "alpha\nbeta\ngamma delta\n";
    let mut model = Model::new(text, 16.0);
    let options = LayoutOptions::new(
        100.0,
        BreakStrategy::Character,
        MonospaceMeasure::new(1.0, 16.0),
    );

    // Column 3 of "gamma delta", up into "beta", up again into "alpha".
    model.set_selected_range(14..14);
    model.move_carets_vertically(text, Direction::Up, &options);
    assert_eq!(ranges(&model), vec![9..9]);
    model.move_carets_vertically(text, Direction::Up, &options);
    assert_eq!(ranges(&model), vec![3..3]);

    // Back down: the remembered horizontal position restores the column.
    model.move_carets_vertically(text, Direction::Down, &options);
    assert_eq!(ranges(&model), vec![9..9]);
    model.move_carets_vertically(text, Direction::Down, &options);
    assert_eq!(ranges(&model), vec![14..14]);
}
