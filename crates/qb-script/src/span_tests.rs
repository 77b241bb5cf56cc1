use super::*;

#[test]
fn first_line_first_column_is_one_one() {
    assert_eq!(line_column("foo = bar", 0), (1, 1));
}

#[test]
fn column_advances_by_code_point_not_byte() {
    // "café" — é is 2 bytes; the 'b' below is at byte offset 5 but
    // code-point column 5 ("c","a","f","é" = 4 code points before it).
    let (line, col) = line_column("café bar", 5);
    assert_eq!(line, 1);
    assert_eq!(col, 5);
}

#[test]
fn line_increments_after_newline() {
    let src = "a = 1\nb = 2";
    let (line, col) = line_column(src, 6);
    assert_eq!(line, 2);
    assert_eq!(col, 1);
}

#[test]
fn span_merge_covers_both() {
    let a = Span::new(2, 5);
    let b = Span::new(4, 9);
    let m = a.merge(b);
    assert_eq!(m, Span::new(2, 9));
}

#[test]
fn span_slice_extracts_text() {
    let src = "foo = bar";
    assert_eq!(Span::new(6, 9).slice(src), "bar");
}
