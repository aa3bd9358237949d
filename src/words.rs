//! Word-level span wrapping.
//!
//! Color spans are dissolved into one `<span class="<color> colorable">` per
//! whitespace-delimited word so the palette can recolor single words. Spans
//! that are already colorable, and censorship spans, pass through untouched.

use crate::markup::{self, Token, CENSORED, COLORABLE, HIDDEN};
use crate::sanitize;

/// Color used for text that sits outside any span.
pub const DEFAULT_CLASS: &str = "white";

enum Frame {
    /// A color span being dissolved; holds its color classes
    Dissolved(Vec<String>),
    /// Passed through verbatim together with everything inside it
    Opaque,
}

pub fn wrap_words(markup_in: &str) -> String {
    let mut out = String::with_capacity(markup_in.len() * 2);
    let mut stack: Vec<Frame> = Vec::new();
    let mut opaque_depth = 0usize;

    for token in markup::tokenize(markup_in) {
        if opaque_depth > 0 {
            match token {
                Token::Open { raw, .. } => {
                    opaque_depth += 1;
                    out.push_str(raw);
                }
                Token::Close { tag } => {
                    opaque_depth -= 1;
                    if opaque_depth == 0 {
                        stack.pop();
                    }
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
                Token::Break => out.push_str("<br>"),
                Token::Text(text) => out.push_str(text),
            }
            continue;
        }

        match token {
            Token::Open { raw, .. } => {
                let classes = markup::classes(raw);
                if classes.iter().any(|c| c == COLORABLE || c == CENSORED) {
                    opaque_depth = 1;
                    stack.push(Frame::Opaque);
                    out.push_str(raw);
                } else {
                    let colors = classes
                        .into_iter()
                        .filter(|c| c != HIDDEN)
                        .collect::<Vec<_>>();
                    stack.push(Frame::Dissolved(colors));
                }
            }
            Token::Close { .. } => {
                stack.pop();
            }
            Token::Break => out.push_str("<br>"),
            Token::Text(text) => {
                let class = current_color(&stack);
                push_words(&mut out, text, &class);
            }
        }
    }

    out
}

fn current_color(stack: &[Frame]) -> String {
    stack
        .iter()
        .rev()
        .find_map(|f| match f {
            Frame::Dissolved(classes) if !classes.is_empty() => Some(classes.join(" ")),
            _ => None,
        })
        .unwrap_or_else(|| DEFAULT_CLASS.to_string())
}

fn push_words(out: &mut String, escaped: &str, class: &str) {
    let unescaped = sanitize::unescape(escaped);
    let plain = sanitize::normalize_quotes(&unescaped);
    let open = markup::open_span(&[class, COLORABLE]);

    let mut word_start: Option<usize> = None;
    for (i, c) in plain.char_indices() {
        if c.is_whitespace() {
            if let Some(start) = word_start.take() {
                push_word(out, &open, &plain[start..i]);
            }
            out.push(c);
        } else if word_start.is_none() {
            word_start = Some(i);
        }
    }
    if let Some(start) = word_start {
        push_word(out, &open, &plain[start..]);
    }
}

fn push_word(out: &mut String, open: &str, word: &str) {
    out.push_str(open);
    out.push_str(&sanitize::escape_text(word));
    out.push_str("</span>");
}
