//! Scoped escaping and text normalization for chat lines.
//!
//! Only the shapes the formatter emits are handled here: text content and
//! double-quoted attribute values. This is not a general HTML sanitizer.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[\d{1,2}:\d{2}:\d{2}\]\s?").expect("timestamp regex"));

static DASH_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{3,}").expect("dash regex"));

/// Escape text content (`&`, `<`, `>`).
pub fn escape_text(text: &str) -> Cow<'_, str> {
    htmlize::escape_text(text)
}

/// Escape a double-quoted attribute value (`&`, `<`, `>`, `"`).
pub fn escape_attr(text: &str) -> Cow<'_, str> {
    htmlize::escape_attribute(text)
}

/// Decode entities in text read back from generated markup.
pub fn unescape(text: &str) -> Cow<'_, str> {
    htmlize::unescape(text)
}

/// Replace typographic quotes with their ASCII counterparts.
pub fn normalize_quotes(text: &str) -> Cow<'_, str> {
    if !text.chars().any(is_typographic_quote) {
        return Cow::Borrowed(text);
    }

    Cow::Owned(
        text.chars()
            .map(|c| match c {
                '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{2032}' => '\'',
                '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => '"',
                other => other,
            })
            .collect(),
    )
}

fn is_typographic_quote(c: char) -> bool {
    matches!(
        c,
        '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{2032}' | '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}'
    )
}

/// Replace em/en dashes with `-` and collapse long dash runs to `--`.
pub fn normalize_dashes(text: &str) -> Cow<'_, str> {
    if !text.contains(['\u{2014}', '\u{2013}']) && !text.contains("---") {
        return Cow::Borrowed(text);
    }

    let replaced = text.replace(['\u{2014}', '\u{2013}'], "-");
    Cow::Owned(DASH_RUN.replace_all(&replaced, "--").into_owned())
}

/// Normalize a raw input line before classification.
pub fn normalize_line(line: &str) -> String {
    let line = line.trim_end_matches(['\r', '\n']);
    let quotes = normalize_quotes(line);
    normalize_dashes(&quotes).into_owned()
}

/// Remove a leading `[HH:MM:SS]` timestamp, if present.
pub fn strip_timestamp(line: &str) -> &str {
    match TIMESTAMP.find(line) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("a < b & c > d"), "a &lt; b &amp; c &gt; d");
        assert_eq!(escape_text("plain"), "plain");
    }

    #[test]
    fn test_escape_attr_quotes() {
        assert_eq!(escape_attr(r#"say "hi""#), "say &quot;hi&quot;");
    }

    #[test]
    fn test_unescape_roundtrip() {
        let raw = "<b> & \"q\"";
        assert_eq!(unescape(&escape_attr(raw)), raw);
    }

    #[test]
    fn test_normalize_quotes() {
        assert_eq!(normalize_quotes("Bob\u{2019}s \u{201C}car\u{201D}"), "Bob's \"car\"");
        assert!(matches!(normalize_quotes("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_normalize_dashes() {
        assert_eq!(normalize_dashes("wait\u{2014}what"), "wait-what");
        assert_eq!(normalize_dashes("a ----- b"), "a -- b");
        assert_eq!(normalize_dashes("a -- b"), "a -- b");
    }

    #[test]
    fn test_strip_timestamp() {
        assert_eq!(strip_timestamp("[12:00:00] Alice says: hi"), "Alice says: hi");
        assert_eq!(strip_timestamp("[1:02:03]Bob"), "Bob");
        assert_eq!(strip_timestamp("Alice says: [12:00:00]"), "Alice says: [12:00:00]");
        assert_eq!(strip_timestamp("[12:00] short"), "[12:00] short");
    }
}
