//! Reader/writer for the restricted markup the formatter produces.
//!
//! The pipeline only ever emits `<span ...>`, `</span>`, `<br>` and escaped
//! text, so every stage after classification walks the same token stream
//! instead of matching regexes across tag boundaries.

use crate::sanitize;
use regex::Regex;
use std::sync::LazyLock;

/// Class marking a word-level span the palette may recolor.
pub const COLORABLE: &str = "colorable";
/// Class marking a censorship span.
pub const CENSORED: &str = "censored";
/// Class marking content hidden from view but kept in the document.
pub const HIDDEN: &str = "hidden";

static ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*"([^"]*)""#).expect("attr regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// Opening tag; `raw` is the full tag text including angle brackets
    Open { tag: &'a str, raw: &'a str },
    Close { tag: &'a str },
    Break,
    /// Escaped text exactly as it appears in the markup
    Text(&'a str),
}

impl<'a> Token<'a> {
    pub fn is_censor_open(&self) -> bool {
        match self {
            Token::Open { tag, raw } => *tag == "span" && has_class(raw, CENSORED),
            _ => false,
        }
    }
}

/// Split markup into tags, breaks and text. A `<` that never closes is text.
pub fn tokenize(markup: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = markup;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            tokens.push(Token::Text(rest));
            break;
        };

        if lt > 0 {
            tokens.push(Token::Text(&rest[..lt]));
            rest = &rest[lt..];
        }

        let Some(gt) = rest.find('>') else {
            tokens.push(Token::Text(rest));
            break;
        };

        let raw = &rest[..=gt];
        let inner = raw[1..raw.len() - 1].trim();
        if let Some(name) = inner.strip_prefix('/') {
            tokens.push(Token::Close {
                tag: name.trim(),
            });
        } else {
            let tag = inner
                .split(|c: char| c.is_whitespace() || c == '/')
                .next()
                .unwrap_or_default();
            if tag.eq_ignore_ascii_case("br") {
                tokens.push(Token::Break);
            } else if tag.is_empty() {
                tokens.push(Token::Text(raw));
            } else {
                tokens.push(Token::Open { tag, raw });
            }
        }
        rest = &rest[gt + 1..];
    }

    tokens
}

/// Read a double-quoted attribute from a raw opening tag (entity-decoded).
pub fn attr(raw_tag: &str, name: &str) -> Option<String> {
    ATTR.captures_iter(raw_tag)
        .find(|caps| &caps[1] == name)
        .map(|caps| sanitize::unescape(&caps[2]).into_owned())
}

/// All double-quoted attributes of a raw opening tag, in source order.
pub fn attrs(raw_tag: &str) -> Vec<(String, String)> {
    ATTR.captures_iter(raw_tag)
        .map(|caps| (caps[1].to_string(), sanitize::unescape(&caps[2]).into_owned()))
        .collect()
}

/// Class list of a raw opening tag.
pub fn classes(raw_tag: &str) -> Vec<String> {
    attr(raw_tag, "class")
        .map(|c| c.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn has_class(raw_tag: &str, class: &str) -> bool {
    attr(raw_tag, "class").is_some_and(|c| c.split_whitespace().any(|c| c == class))
}

/// Build `<span class="...">` for a class list.
pub fn open_span<S: AsRef<str>>(classes: &[S]) -> String {
    let joined: Vec<&str> = classes.iter().map(AsRef::as_ref).collect();
    format!("<span class=\"{}\">", sanitize::escape_attr(&joined.join(" ")))
}

/// A complete span around raw (unescaped) text.
pub fn span(class: &str, text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    format!("{}{}</span>", open_span(&[class]), sanitize::escape_text(text))
}

/// A censorship span: hidden from view, original kept in `data-original`.
pub fn censor_span(text: &str) -> String {
    format!(
        "<span class=\"{} {}\" data-original=\"{}\">{}</span>",
        HIDDEN,
        CENSORED,
        sanitize::escape_attr(text),
        sanitize::escape_text(text)
    )
}

/// Number of visible characters in escaped text (an entity counts once).
pub fn visible_len(escaped: &str) -> usize {
    sanitize::unescape(escaped).chars().count()
}

/// Concatenated, entity-decoded text content of a fragment.
pub fn text_content(markup: &str) -> String {
    let mut out = String::new();
    for token in tokenize(markup) {
        match token {
            Token::Text(t) => out.push_str(&sanitize::unescape(t)),
            Token::Break => out.push('\n'),
            _ => {}
        }
    }
    out
}

/// True when every opening tag has a matching close in the right order.
pub fn is_balanced(markup: &str) -> bool {
    let mut stack: Vec<&str> = Vec::new();
    for token in tokenize(markup) {
        match token {
            Token::Open { tag, .. } => stack.push(tag),
            Token::Close { tag } => {
                if stack.pop() != Some(tag) {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_mixed() {
        let tokens = tokenize("<span class=\"white\">a &amp; b</span><br>c");
        assert_eq!(
            tokens,
            vec![
                Token::Open {
                    tag: "span",
                    raw: "<span class=\"white\">"
                },
                Token::Text("a &amp; b"),
                Token::Close { tag: "span" },
                Token::Break,
                Token::Text("c"),
            ]
        );
    }

    #[test]
    fn test_tokenize_self_closing_break() {
        assert_eq!(tokenize("a<br/>b<br />"), vec![
            Token::Text("a"),
            Token::Break,
            Token::Text("b"),
            Token::Break,
        ]);
    }

    #[test]
    fn test_unclosed_angle_is_text() {
        assert_eq!(tokenize("a <b"), vec![Token::Text("a "), Token::Text("<b")]);
    }

    #[test]
    fn test_attr_and_classes() {
        let raw = "<span class=\"hidden censored\" data-original=\"$5 &amp; up\">";
        assert_eq!(classes(raw), vec!["hidden", "censored"]);
        assert_eq!(attr(raw, "data-original").as_deref(), Some("$5 & up"));
        assert!(has_class(raw, "censored"));
        assert!(!has_class(raw, "censor"));
    }

    #[test]
    fn test_span_escapes() {
        assert_eq!(span("white", "a<b"), "<span class=\"white\">a&lt;b</span>");
        assert_eq!(span("white", ""), "");
    }

    #[test]
    fn test_visible_len_counts_entities_once() {
        assert_eq!(visible_len("a &amp; b"), 5);
    }

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced("<span class=\"a\"><span class=\"b\">x</span></span>"));
        assert!(!is_balanced("<span class=\"a\">x"));
        assert!(!is_balanced("</span>"));
    }

    #[test]
    fn test_text_content() {
        assert_eq!(text_content("<span class=\"w\">a &lt; b</span><br>c"), "a < b\nc");
    }
}
