//! Soft line breaking of rendered markup.
//!
//! Breaks are greedy: once the visible length of the current line exceeds
//! the limit, the last space seen on that line is turned into a `<br>`.
//! Spans open at that point are closed before the break and reopened with
//! the same opening tag after it, so the output stays balanced.

use crate::markup::{self, Token};

/// Lower bound for the configured line length.
pub const MIN_LINE_LENGTH: usize = 10;
/// Default line length in visible characters.
pub const DEFAULT_LINE_LENGTH: usize = 77;

pub fn clamp_line_length(max_len: usize) -> usize {
    max_len.max(MIN_LINE_LENGTH)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit<'a> {
    Open(&'a str),
    Close(&'a str),
    /// A hard break present in the input
    Break,
    /// A breakable space (escaped text of length one)
    Space(&'a str),
    /// Text that may not be broken, with its visible length
    Chunk(&'a str, usize),
    /// A space that has been turned into a line break
    SoftBreak,
}

fn flatten(markup_in: &str) -> Vec<Unit<'_>> {
    let mut units = Vec::new();
    let mut censor_depth = 0usize;

    for token in markup::tokenize(markup_in) {
        match token {
            Token::Open { raw, .. } => {
                if censor_depth > 0 || token.is_censor_open() {
                    censor_depth += 1;
                }
                units.push(Unit::Open(raw));
            }
            Token::Close { tag } => {
                censor_depth = censor_depth.saturating_sub(1);
                units.push(Unit::Close(tag));
            }
            Token::Break => units.push(Unit::Break),
            Token::Text(text) if censor_depth > 0 => {
                units.push(Unit::Chunk(text, markup::visible_len(text)));
            }
            Token::Text(text) => split_text(text, &mut units),
        }
    }

    units
}

fn split_text<'a>(text: &'a str, units: &mut Vec<Unit<'a>>) {
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == ' ' {
            if i > start {
                let chunk = &text[start..i];
                units.push(Unit::Chunk(chunk, markup::visible_len(chunk)));
            }
            units.push(Unit::Space(&text[i..i + 1]));
            start = i + 1;
        }
    }
    if start < text.len() {
        let chunk = &text[start..];
        units.push(Unit::Chunk(chunk, markup::visible_len(chunk)));
    }
}

/// Insert `<br>` breaks so no line exceeds `max_len` visible characters
/// where a space allows it. Censored text counts toward the length.
pub fn insert_breaks(markup_in: &str, max_len: usize) -> String {
    let max_len = clamp_line_length(max_len);
    let mut units = flatten(markup_in);

    let mut line_len = 0usize;
    let mut last_space: Option<(usize, usize)> = None;

    for i in 0..units.len() {
        let unit = units[i];
        match unit {
            Unit::Break => {
                line_len = 0;
                last_space = None;
            }
            Unit::Space(_) => {
                last_space = Some((i, line_len));
                line_len += 1;
            }
            Unit::Chunk(_, len) => {
                line_len += len;
                if line_len > max_len {
                    if let Some((at, len_before)) = last_space.take() {
                        units[at] = Unit::SoftBreak;
                        line_len -= len_before + 1;
                    }
                }
            }
            _ => {}
        }
    }

    render(&units)
}

fn render(units: &[Unit<'_>]) -> String {
    let mut out = String::new();
    let mut open: Vec<&str> = Vec::new();

    for unit in units {
        match unit {
            Unit::Open(raw) => {
                open.push(raw);
                out.push_str(raw);
            }
            Unit::Close(tag) => {
                open.pop();
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Unit::Break => out.push_str("<br>"),
            Unit::Space(s) | Unit::Chunk(s, _) => out.push_str(s),
            Unit::SoftBreak => {
                for _ in &open {
                    out.push_str("</span>");
                }
                out.push_str("<br>");
                for raw in &open {
                    out.push_str(raw);
                }
            }
        }
    }

    out
}

/// Visible length of each line of a fragment, for diagnostics and tests.
pub fn line_lengths(markup_in: &str) -> Vec<usize> {
    markup::text_content(markup_in)
        .split('\n')
        .map(|l| l.chars().count())
        .collect()
}
