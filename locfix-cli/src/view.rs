//! Terminal rendering of the current node: its spans and a window of the
//! source around the proposed span.

use std::path::Path;

use locfix_core::{Comparison, DisplayOptions, LineTable};
use owo_colors::{OwoColorize, Style};
use serde_json::Value;

/// Lines of context shown above and below the proposed span.
const CONTEXT: i64 = 2;

/// Applies styles, or not, depending on whether the output is a terminal.
pub struct Painter {
    color: bool,
}

impl Painter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if !self.color || text.is_empty() {
            text.to_string()
        } else {
            text.style(style).to_string()
        }
    }
}

fn gray() -> Style {
    Style::new().bright_black()
}

fn highlight() -> Style {
    Style::new().white().on_green()
}

/// Everything needed to draw one node.
pub struct Screen<'a> {
    pub file: &'a str,
    pub position: usize,
    pub comparison: &'a Comparison,
    pub label: &'a str,
    pub token: Option<&'a Value>,
    pub lines: &'a LineTable,
    pub display: DisplayOptions,
}

impl Screen<'_> {
    pub fn render(&self, painter: &Painter) -> String {
        let c = self.comparison;
        let mut output = String::new();

        let status = if c.matches {
            Style::new().green()
        } else {
            Style::new().red()
        };
        let stem = Path::new(self.file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(self.file);
        output.push_str(&format!(
            "{} {} {}\n",
            painter.paint(stem, status),
            painter.paint("@", gray()),
            self.position + 1
        ));

        for (title, span) in [
            ("  actual:", &c.actual),
            ("expected:", &c.expected),
            (" will be:", &c.proposed),
        ] {
            output.push_str(&format!(
                "{} {}\n",
                painter.paint(title, gray()),
                painter.paint(&span.to_string(), Style::new().white())
            ));
        }

        let indent = if self.display.json { "     " } else { "    " };
        output.push_str(&format!(
            "{indent}{}\n",
            painter.paint(self.label, Style::new().white())
        ));

        if self.display.show_token
            && let Some(token) = self.token
        {
            output.push_str(&serde_json::to_string_pretty(token).unwrap_or_default());
            output.push('\n');
        }

        let proposed = &c.proposed;
        for line in (proposed.start.line - CONTEXT)..=(proposed.end.line + CONTEXT) {
            output.push_str(&format!("{line:>4}| {}\n", self.render_line(line, painter)));
        }

        output
    }

    fn render_line(&self, line: i64, painter: &Painter) -> String {
        let Some(text) = self.lines.line(line) else {
            return painter.paint(" ", Style::new().on_red());
        };
        // The BOM is hidden but still counts as column 1 of line 1.
        let (text, hidden) = match text.strip_prefix('\u{feff}') {
            Some(rest) if line == 1 => (rest, 1),
            _ => (text, 0),
        };
        let json = self.display.json;
        let span = &self.comparison.proposed;

        if line < span.start.line || line > span.end.line {
            let shown = if json {
                serde_json::to_string(text).unwrap_or_default()
            } else {
                text.to_string()
            };
            return painter.paint(&shown, gray());
        }

        let len = text.chars().count();
        let mut from = if line == span.start.line {
            char_index(span.start.column - hidden, len)
        } else {
            0
        };
        let mut to = if line == span.end.line {
            char_index(span.end.column - hidden, len).max(from)
        } else {
            len
        };

        // A zero-width span marks the character it sits on, or the line end.
        let mut at_line_end = false;
        if span.start.line == span.end.line && from == to {
            if from < len {
                to = from + 1;
            } else {
                from = len;
                to = len;
                at_line_end = true;
            }
        }

        let (before, inside, after) = split_chars(text, from, to);
        let mut rendered = String::new();
        if json {
            rendered.push_str(&painter.paint("\"", gray()));
        }
        rendered.push_str(&painter.paint(&escape(before, json), gray()));
        rendered.push_str(&painter.paint(&escape(inside, json), highlight()));
        rendered.push_str(&painter.paint(&escape(after, json), gray()));
        match (at_line_end, json) {
            (true, true) => rendered.push_str(&painter.paint("\"", highlight())),
            (true, false) => rendered.push_str(&painter.paint(" ", highlight())),
            (false, true) => rendered.push_str(&painter.paint("\"", gray())),
            (false, false) => {}
        }
        rendered
    }
}

fn char_index(column: i64, len: usize) -> usize {
    usize::try_from(column - 1).unwrap_or(0).min(len)
}

/// Split `text` at two char offsets.
fn split_chars(text: &str, from: usize, to: usize) -> (&str, &str, &str) {
    let byte = |n: usize| text.char_indices().nth(n).map_or(text.len(), |(i, _)| i);
    let (from, to) = (byte(from), byte(to));
    (&text[..from], &text[from..to], &text[to..])
}

/// JSON-escape `text` without the surrounding quotes.
fn escape(text: &str, json: bool) -> String {
    if !json {
        return text.to_string();
    }
    let quoted = serde_json::to_string(text).unwrap_or_default();
    quoted
        .strip_prefix('"')
        .and_then(|q| q.strip_suffix('"'))
        .unwrap_or(&quoted)
        .to_string()
}
