use text_model::{
    BreakStrategy, LayoutOptions, LineStorage, MonospaceMeasure, line_lengths_utf16,
};

#[test]
fn test_ascending_lengths_offset_36_is_the_ninth_line() {
    // Lines of lengths 1..=20 sum to 210; cumulative starts run
    // 0,1,3,6,10,15,21,28,36 - offset 36 begins the ninth line, length 9.
    let storage = LineStorage::build(1..=20, 12.0);
    assert_eq!(storage.len(), 210);

    let line = storage.line_at_offset(36).expect("offset in bounds");
    assert_eq!(line.index, 8);
    assert_eq!(line.offset, 36);
    assert_eq!(line.length, 9);
}

#[test]
fn test_every_offset_round_trips() {
    let storage = LineStorage::build(1..=20, 12.0);
    for offset in 0..storage.len() {
        let line = storage.line_at_offset(offset).expect("offset in bounds");
        assert!(line.range().contains(&offset));
    }
    // One past the end is a miss, not a panic.
    assert!(storage.line_at_offset(210).is_none());
    assert!(storage.line_at_offset(usize::MAX).is_none());
}

#[test]
fn test_every_y_round_trips() {
    let storage = LineStorage::build([4, 7, 2, 9], 10.0);
    let mut y = 0.25f64;
    while y < storage.total_height() {
        let line = storage.line_at_y(y).expect("y in bounds");
        assert!(line.y <= y && y < line.y + line.height);
        y += 2.5;
    }
    assert!(storage.line_at_y(storage.total_height()).is_none());
    assert!(storage.line_at_y(-1.0).is_none());
}

#[test]
fn test_viewport_slice_by_y_range() {
    let storage = LineStorage::build(std::iter::repeat(40).take(100), 16.0);
    let rows: Vec<usize> = storage
        .lines_in_y_range(320.0..480.0)
        .map(|l| l.index)
        .collect();
    assert_eq!(rows, (20..30).collect::<Vec<_>>());
}

#[test]
fn test_range_iteration_matches_point_queries() {
    let storage = LineStorage::build([3, 1, 4, 1, 5, 9, 2, 6], 16.0);
    for line in storage.lines_in_range(5..20) {
        let point = storage.line_at_offset(line.offset).expect("offset in bounds");
        assert_eq!(point, line);
    }
}

#[test]
fn test_wrapping_grows_height_and_shifts_y_queries() {
    let text = "short\nthis line is long enough to wrap\nend";
    let mut storage = LineStorage::build(line_lengths_utf16(text), 16.0);
    assert_eq!(storage.total_height(), 48.0);

    // Lay out the middle line at 10 columns: 33 units wrap into four
    // fragments of height 16 each.
    let options = LayoutOptions::new(
        10.0,
        BreakStrategy::Character,
        MonospaceMeasure::new(1.0, 16.0),
    );
    let ran = storage.ensure_layout(1, "this line is long enough to wrap\n", &options);
    assert!(ran);
    assert_eq!(storage.total_height(), 96.0);

    let line = storage.line_at_y(70.0).expect("y in bounds");
    assert_eq!(line.index, 1);
    let line = storage.line_at_y(85.0).expect("y in bounds");
    assert_eq!(line.index, 2);
    assert_eq!(line.y, 80.0);
}
