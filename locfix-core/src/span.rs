//! Source spans and the cursor arithmetic used to edit them.
//!
//! Lines and columns are 1-based. A column may sit one past the last
//! character of its line, which marks a zero-width end-of-line position.
//! Every editing operation returns a new [`Span`]; nothing is mutated in place.

use std::fmt;

/// Filename recorded by the "no expected value" placeholder.
pub const SENTINEL_FILENAME: &str = "??";

/// Line/column value recorded by the "no expected value" placeholder.
pub const UNSET: i64 = -1;

/// A (line, column) cursor. Ordering is lexicographic by line, then column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos {
    pub line: i64,
    pub column: i64,
}

impl Pos {
    pub const fn new(line: i64, column: i64) -> Self {
        Self { line, column }
    }
}

/// Which end of a span an edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Start,
    End,
}

/// A source range: filename plus start and end cursors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub filename: String,
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub fn new(
        filename: impl Into<String>,
        start_line: i64,
        start_column: i64,
        end_line: i64,
        end_column: i64,
    ) -> Self {
        Self {
            filename: filename.into(),
            start: Pos::new(start_line, start_column),
            end: Pos::new(end_line, end_column),
        }
    }

    /// The `("??", -1, -1, -1, -1)` placeholder for a missing expectation.
    pub fn sentinel() -> Self {
        Self::new(SENTINEL_FILENAME, UNSET, UNSET, UNSET, UNSET)
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }

    /// True when every line and column is a real 1-based value.
    pub fn is_resolved(&self) -> bool {
        [
            self.start.line,
            self.start.column,
            self.end.line,
            self.end.column,
        ]
        .iter()
        .all(|v| *v >= 1)
    }

    /// Start does not come after end.
    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }

    pub fn endpoint(&self, endpoint: Endpoint) -> Pos {
        match endpoint {
            Endpoint::Start => self.start,
            Endpoint::End => self.end,
        }
    }

    /// Copy of this span with one endpoint replaced.
    pub fn with_endpoint(&self, endpoint: Endpoint, pos: Pos) -> Self {
        let mut span = self.clone();
        match endpoint {
            Endpoint::Start => span.start = pos,
            Endpoint::End => span.end = pos,
        }
        span
    }
}

fn fmt_value(f: &mut fmt::Formatter<'_>, value: i64) -> fmt::Result {
    if value == UNSET {
        f.write_str("??")
    } else {
        write!(f, "{value}")
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_value(f, self.start.line)?;
        f.write_str(":")?;
        fmt_value(f, self.start.column)?;
        f.write_str(" to ")?;
        fmt_value(f, self.end.line)?;
        f.write_str(":")?;
        fmt_value(f, self.end.column)
    }
}

/// Line table of one source file, used to clamp and move cursors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTable {
    lines: Vec<String>,
    lengths: Vec<i64>,
}

impl LineTable {
    /// Split `text` on `\r\n`, `\n` and `\r`. An empty text still has one
    /// (empty) line.
    pub fn from_source(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    lines.push(std::mem::take(&mut current));
                }
                '\n' => lines.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        lines.push(current);

        let lengths = lines.iter().map(|l| l.chars().count() as i64).collect();
        Self { lines, lengths }
    }

    pub fn line_count(&self) -> i64 {
        self.lengths.len() as i64
    }

    /// Text of a 1-based line, if it exists.
    pub fn line(&self, line: i64) -> Option<&str> {
        if line < 1 {
            return None;
        }
        self.lines.get((line - 1) as usize).map(String::as_str)
    }

    /// Length in characters of `line` (clamped into the document).
    pub fn line_len(&self, line: i64) -> i64 {
        self.lengths[(self.clamp_line(line) - 1) as usize]
    }

    pub fn clamp_line(&self, line: i64) -> i64 {
        line.clamp(1, self.line_count())
    }

    /// Clamp `column` to `[1, line_len(line) + 1]`.
    pub fn clamp_column(&self, line: i64, column: i64) -> i64 {
        column.clamp(1, self.line_len(line) + 1)
    }

    pub fn clamp_pos(&self, pos: Pos) -> Pos {
        let line = self.clamp_line(pos.line);
        Pos::new(line, self.clamp_column(line, pos.column))
    }

    /// Move `endpoint` to the beginning of `line`.
    pub fn set_line_start(&self, span: &Span, endpoint: Endpoint, line: i64) -> Span {
        span.with_endpoint(endpoint, Pos::new(self.clamp_line(line), 1))
    }

    /// Move `endpoint` to `line:column`, clamping both.
    pub fn set_pos(&self, span: &Span, endpoint: Endpoint, line: i64, column: i64) -> Span {
        let moved = self.set_line_start(span, endpoint, line);
        let line = moved.endpoint(endpoint).line;
        moved.with_endpoint(endpoint, Pos::new(line, self.clamp_column(line, column)))
    }

    fn step_forward(&self, pos: Pos) -> Pos {
        if pos.column < self.line_len(pos.line) + 1 {
            Pos::new(pos.line, pos.column + 1)
        } else if pos.line < self.line_count() {
            Pos::new(pos.line + 1, 1)
        } else {
            pos
        }
    }

    fn step_back(&self, pos: Pos) -> Pos {
        if pos.column > 1 {
            Pos::new(pos.line, pos.column - 1)
        } else if pos.line > 1 {
            Pos::new(pos.line - 1, self.line_len(pos.line - 1) + 1)
        } else {
            pos
        }
    }

    /// Shift `endpoint` by `amount` columns, rolling over line boundaries and
    /// stopping at the document edges. If the endpoints would cross, the other
    /// endpoint is dragged along so start never follows end.
    pub fn move_endpoint(&self, span: &Span, endpoint: Endpoint, amount: i64) -> Span {
        let mut pos = self.clamp_pos(span.endpoint(endpoint));

        for _ in 0..amount.unsigned_abs() {
            let next = if amount > 0 {
                self.step_forward(pos)
            } else {
                self.step_back(pos)
            };
            if next == pos {
                break;
            }
            pos = next;
        }

        let moved = span.with_endpoint(endpoint, pos);
        if moved.is_ordered() {
            return moved;
        }
        match endpoint {
            Endpoint::Start => moved.with_endpoint(Endpoint::End, pos),
            Endpoint::End => moved.with_endpoint(Endpoint::Start, pos),
        }
    }

    /// Derive an editable span from `reference`, clamped to this document.
    ///
    /// The start never lands above `min_line`; the end never precedes the
    /// start, and a single-line span never has negative width. The returned
    /// span carries `filename`.
    pub fn fix_endpoints(&self, filename: &str, reference: &Span, min_line: i64) -> Span {
        let min_line = min_line.max(1);
        let base = Span {
            filename: filename.to_string(),
            start: Pos::new(1, 1),
            end: Pos::new(1, 1),
        };

        let proposed = if min_line > reference.start.line {
            self.set_line_start(&base, Endpoint::Start, min_line)
        } else {
            self.set_pos(
                &base,
                Endpoint::Start,
                reference.start.line,
                reference.start.column,
            )
        };

        let mut proposed = if reference.end.line >= proposed.start.line {
            self.set_pos(
                &proposed,
                Endpoint::End,
                reference.end.line,
                reference.end.column,
            )
        } else {
            proposed.with_endpoint(Endpoint::End, proposed.start)
        };

        if proposed.start.line == proposed.end.line && proposed.end.column < proposed.start.column
        {
            proposed.end.column = proposed.start.column;
        }

        proposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LineTable {
        // lengths: 5, 0, 3
        LineTable::from_source("hello\n\nabc")
    }

    fn span(sl: i64, sc: i64, el: i64, ec: i64) -> Span {
        Span::new("a.pug", sl, sc, el, ec)
    }

    #[test]
    fn splits_on_all_line_endings() {
        let lines = LineTable::from_source("a\r\nbb\rccc\n");
        assert_eq!(lines.line_count(), 4);
        assert_eq!(lines.line_len(1), 1);
        assert_eq!(lines.line_len(2), 2);
        assert_eq!(lines.line_len(3), 3);
        assert_eq!(lines.line_len(4), 0);
        assert_eq!(lines.line(2), Some("bb"));
        assert_eq!(lines.line(0), None);
    }

    #[test]
    fn empty_source_has_one_line() {
        let lines = LineTable::from_source("");
        assert_eq!(lines.line_count(), 1);
        assert_eq!(lines.clamp_column(1, 10), 1);
    }

    #[test]
    fn clamps_stay_in_range_for_extreme_input() {
        let lines = table();
        for value in [-100, -1, 0, 1, 2, 3, 4, 100_000, i64::MAX, i64::MIN] {
            let line = lines.clamp_line(value);
            assert!((1..=lines.line_count()).contains(&line));
            for column in [-100, 0, 1, 6, 100_000] {
                let column = lines.clamp_column(value, column);
                assert!(column >= 1 && column <= lines.line_len(line) + 1);
            }
        }
    }

    #[test]
    fn set_line_start_resets_column() {
        let lines = table();
        let moved = lines.set_line_start(&span(1, 4, 3, 2), Endpoint::End, 99);
        assert_eq!(moved.end, Pos::new(3, 1));
        assert_eq!(moved.start, Pos::new(1, 4));
    }

    #[test]
    fn set_pos_clamps_column_to_end_of_line() {
        let lines = table();
        let moved = lines.set_pos(&span(1, 1, 1, 1), Endpoint::Start, 1, 40);
        assert_eq!(moved.start, Pos::new(1, 6));
    }

    #[test]
    fn move_forward_rolls_to_next_line() {
        let lines = table();
        let moved = lines.move_endpoint(&span(1, 1, 1, 5), Endpoint::End, 2);
        assert_eq!(moved.end, Pos::new(2, 1));
        let moved = lines.move_endpoint(&moved, Endpoint::End, 2);
        assert_eq!(moved.end, Pos::new(3, 2));
    }

    #[test]
    fn move_back_rolls_to_previous_end_of_line() {
        let lines = table();
        let moved = lines.move_endpoint(&span(1, 1, 3, 1), Endpoint::End, -1);
        assert_eq!(moved.end, Pos::new(2, 1));
        let moved = lines.move_endpoint(&moved, Endpoint::End, -1);
        assert_eq!(moved.end, Pos::new(1, 6));
    }

    #[test]
    fn move_stops_at_document_edges() {
        let lines = table();
        let moved = lines.move_endpoint(&span(1, 2, 3, 1), Endpoint::Start, -50);
        assert_eq!(moved.start, Pos::new(1, 1));
        let moved = lines.move_endpoint(&moved, Endpoint::End, 50);
        assert_eq!(moved.end, Pos::new(3, 4));
    }

    #[test]
    fn moving_start_past_end_drags_end() {
        let lines = table();
        let moved = lines.move_endpoint(&span(1, 1, 1, 2), Endpoint::Start, 3);
        assert_eq!(moved.start, Pos::new(1, 4));
        assert_eq!(moved.end, Pos::new(1, 4));
    }

    #[test]
    fn moving_end_before_start_drags_start() {
        let lines = table();
        let moved = lines.move_endpoint(&span(3, 2, 3, 3), Endpoint::End, -3);
        assert_eq!(moved.end, Pos::new(2, 1));
        assert_eq!(moved.start, Pos::new(2, 1));
    }

    #[test]
    fn endpoints_never_cross_over_a_sequence_of_moves() {
        let lines = table();
        let mut current = span(1, 3, 3, 2);
        let moves = [
            (Endpoint::Start, 7),
            (Endpoint::End, -9),
            (Endpoint::Start, 100),
            (Endpoint::End, -3),
            (Endpoint::Start, -2),
            (Endpoint::End, 1),
            (Endpoint::Start, 12),
        ];
        for (endpoint, amount) in moves {
            current = lines.move_endpoint(&current, endpoint, amount);
            assert!(current.is_ordered(), "{current:?} after {endpoint:?} {amount}");
        }
    }

    #[test]
    fn fix_endpoints_copies_reference_within_bounds() {
        let lines = table();
        let proposed = lines.fix_endpoints("a.pug", &span(1, 2, 3, 9), 1);
        assert_eq!(proposed, span(1, 2, 3, 4));
    }

    #[test]
    fn fix_endpoints_keeps_zero_width_spans() {
        let lines = table();
        let proposed = lines.fix_endpoints("a.pug", &span(1, 5, 1, 5), 1);
        assert_eq!(proposed.start, Pos::new(1, 5));
        assert!(proposed.end.column >= proposed.start.column);
        assert_eq!(proposed.end, Pos::new(1, 5));
    }

    #[test]
    fn fix_endpoints_widens_negative_width() {
        let lines = table();
        let proposed = lines.fix_endpoints("a.pug", &span(1, 4, 1, 2), 1);
        assert_eq!(proposed, span(1, 4, 1, 4));
    }

    #[test]
    fn fix_endpoints_respects_min_line() {
        let lines = table();
        let proposed = lines.fix_endpoints("a.pug", &span(1, 3, 3, 2), 2);
        assert_eq!(proposed.start, Pos::new(2, 1));
        assert_eq!(proposed.end, Pos::new(3, 2));

        let collapsed = lines.fix_endpoints("a.pug", &span(1, 3, 1, 5), 3);
        assert_eq!(collapsed.start, Pos::new(3, 1));
        assert_eq!(collapsed.end, Pos::new(3, 1));
    }

    #[test]
    fn sentinel_is_not_resolved() {
        assert!(Span::sentinel().is_sentinel());
        assert!(!Span::sentinel().is_resolved());
        assert!(span(1, 1, 1, 1).is_resolved());
        assert_eq!(Span::sentinel().to_string(), "??:?? to ??:??");
        assert_eq!(span(1, 2, 3, 4).to_string(), "1:2 to 3:4");
    }
}
