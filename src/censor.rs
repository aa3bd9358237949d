//! Censorship overlay: masks amounts, counts and IDs in classified markup.
//!
//! Only text tokens are rewritten, so existing spans are never split or
//! corrupted, and text already inside a censorship span is skipped. Masked
//! text is wrapped, never removed: the original is kept both as the (hidden)
//! span content and in `data-original`.

use crate::markup::{self, Token};
use crate::sanitize;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static AUTO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?P<cur>\[-?\$\d[\d,]*(?:\.\d{1,3})?\]|-?\$\d[\d,]*(?:\.\d{1,3})?)(?P<mult>\s*x\d+\b)?",
        r"|(?P<count>\(\d+\))",
        r"|(?P<qty>\b\d[\d,]*(?:\.\d+)?\s*(?i:grams?|g|kg|kilos?|pills?|pieces?|pcs|units?|bullets?|rounds?|ounces?|oz|bags?|joints?|bottles?)\b)",
        r"|(?P<hash>\[#\d+\]|#\d+)",
    ))
    .expect("censor regex")
});

static LEADING_MULTIPLIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\s*)(x\d+)\b").expect("multiplier regex"));

static MANUAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"÷([^÷]*)÷").expect("manual regex"));

static CHANNEL_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[S: \d+ \| CH: [^\]]+\]").expect("channel regex"));

static DATE_STAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d{1,2}/(?:[a-z]{3}|\d{1,2})/\d{4}|\d{4}-\d{2}-\d{2}").expect("date regex")
});

/// Lines that are operationally informative and never auto-censored.
pub fn is_excluded(original: &str) -> bool {
    CHANNEL_HEADER.is_match(original)
        || DATE_STAMP.is_match(original)
        || original.to_lowercase().contains("intercom")
}

/// Apply manual `÷…÷` markers and, when `enabled`, automatic masking.
pub fn censor(markup_in: &str, original: &str, enabled: bool) -> String {
    let auto = enabled && !is_excluded(original);
    if !auto && !markup_in.contains('÷') {
        return markup_in.to_string();
    }

    let mut out = String::with_capacity(markup_in.len() * 2);
    // One entry per open span: whether it is a censorship span
    let mut open: Vec<bool> = Vec::new();
    let mut after_currency = false;

    for token in markup::tokenize(markup_in) {
        match token {
            Token::Open { raw, .. } => {
                open.push(token.is_censor_open());
                out.push_str(raw);
            }
            Token::Close { tag } => {
                open.pop();
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Token::Break => {
                after_currency = false;
                out.push_str("<br>");
            }
            Token::Text(text) => {
                if open.iter().any(|c| *c) {
                    out.push_str(text);
                    continue;
                }
                let plain = sanitize::unescape(text);
                let (rendered, ends_with_currency) = mask_text(&plain, auto, after_currency);
                if !plain.trim().is_empty() {
                    after_currency = ends_with_currency;
                }
                out.push_str(&rendered);
            }
        }
    }

    out
}

/// Mask one plain text run; returns escaped markup and whether it ended on
/// a masked currency amount.
fn mask_text(plain: &str, auto: bool, after_currency: bool) -> (String, bool) {
    let mut out = String::new();
    let mut last = 0;

    // manual markers first, then automatic masking on the gaps
    for caps in MANUAL.captures_iter(plain) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let (gap, _) = mask_auto(&plain[last..whole.start()], auto, after_currency && last == 0);
        out.push_str(&gap);
        out.push_str(&markup::censor_span(inner.as_str()));
        last = whole.end();
    }

    let (tail, ends_with_currency) = mask_auto(&plain[last..], auto, after_currency && last == 0);
    out.push_str(&tail);
    (out, ends_with_currency)
}

fn mask_auto(plain: &str, auto: bool, after_currency: bool) -> (String, bool) {
    if !auto {
        return (sanitize::escape_text(plain).into_owned(), false);
    }

    let mut out = String::new();
    let mut start = 0;

    if after_currency {
        if let Some(caps) = LEADING_MULTIPLIER.captures(plain) {
            out.push_str(&caps[1]);
            out.push_str(&markup::censor_span(&caps[2]));
            start = caps.get(0).map_or(0, |m| m.end());
        }
    }

    let rest = &plain[start..];
    let mut last = 0;
    let mut ends_with_currency = false;

    for caps in AUTO.captures_iter(rest) {
        let Some(m) = caps.get(0) else { continue };
        if !boundary_ok(rest, m.start(), &caps) {
            continue;
        }
        out.push_str(&sanitize::escape_text(&rest[last..m.start()]));
        push_match(&mut out, &caps);
        last = m.end();
        ends_with_currency = caps.name("cur").is_some() && rest[m.end()..].trim().is_empty();
    }

    out.push_str(&sanitize::escape_text(&rest[last..]));
    if !rest[last..].trim().is_empty() {
        ends_with_currency = false;
    }
    (out, ends_with_currency)
}

/// Hash IDs must not be glued to a preceding word character.
fn boundary_ok(text: &str, start: usize, caps: &Captures<'_>) -> bool {
    if caps.name("hash").is_none() {
        return true;
    }
    text[..start]
        .chars()
        .next_back()
        .is_none_or(|c| !c.is_alphanumeric() && c != '&')
}

fn push_match(out: &mut String, caps: &Captures<'_>) {
    if let Some(cur) = caps.name("cur") {
        out.push_str(&markup::censor_span(cur.as_str()));
        if let Some(mult) = caps.name("mult") {
            let text = mult.as_str();
            let trimmed = text.trim_start();
            out.push_str(&text[..text.len() - trimmed.len()]);
            out.push_str(&markup::censor_span(trimmed));
        }
    } else if let Some(m) = caps.get(0) {
        out.push_str(&markup::censor_span(m.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn censored_texts(markup_out: &str) -> Vec<String> {
        markup::tokenize(markup_out)
            .into_iter()
            .filter_map(|t| match t {
                Token::Open { raw, .. } if markup::has_class(raw, markup::CENSORED) => {
                    markup::attr(raw, "data-original")
                }
                _ => None,
            })
            .collect()
    }

    fn wrap(text: &str) -> String {
        markup::span("white", text)
    }

    #[test]
    fn test_disabled_is_identity() {
        let m = wrap("You paid $500");
        assert_eq!(censor(&m, "You paid $500", false), m);
    }

    #[test]
    fn test_currency_variants() {
        let line = "Paid $1,200.505 and [$30] and -$4";
        let out = censor(&wrap(line), line, true);
        assert_eq!(censored_texts(&out), vec!["$1,200.505", "[$30]", "-$4"]);
        assert!(markup::is_balanced(&out));
        assert_eq!(markup::text_content(&out), line);
    }

    #[test]
    fn test_brackets_only_taken_in_pairs() {
        let line = "[Price: $30] and [ID #7]";
        let out = censor(&wrap(line), line, true);
        assert_eq!(censored_texts(&out), vec!["$30", "#7"]);
        assert_eq!(markup::text_content(&out), line);
        assert!(out.contains("</span>] and"));
    }

    #[test]
    fn test_counts_quantities_and_ids() {
        let line = "Bread (5), 15 grams, ID #4411 and [#12]";
        let out = censor(&wrap(line), line, true);
        assert_eq!(censored_texts(&out), vec!["(5)", "15 grams", "#4411", "[#12]"]);
    }

    #[test]
    fn test_hash_glued_to_word_is_kept() {
        let line = "channel abc#12";
        let out = censor(&wrap(line), line, true);
        assert!(censored_texts(&out).is_empty());
    }

    #[test]
    fn test_multiplier_after_currency() {
        let line = "Sold $50 x3 today";
        let out = censor(&wrap(line), line, true);
        assert_eq!(censored_texts(&out), vec!["$50", "x3"]);
    }

    #[test]
    fn test_multiplier_in_following_span() {
        let m = format!("{}{}", markup::span("green", "$50"), markup::span("white", " x3 each"));
        let out = censor(&m, "$50 x3 each", true);
        assert_eq!(censored_texts(&out), vec!["$50", "x3"]);
        assert!(markup::is_balanced(&out));
    }

    #[test]
    fn test_no_double_censoring() {
        let line = "Paid $500";
        let once = censor(&wrap(line), line, true);
        let twice = censor(&once, line, true);
        assert_eq!(once, twice);
        assert_eq!(censored_texts(&twice), vec!["$500"]);
    }

    #[test]
    fn test_excluded_lines() {
        for line in [
            "[S: 1 | CH: LSPD] Bob says: code $500",
            "[INFO]: [12/JAN/2024] Paycheck $500",
            "[Gate Intercom] Bring $500",
        ] {
            let m = wrap(line);
            assert_eq!(censor(&m, line, true), m, "{}", line);
        }
    }

    #[test]
    fn test_manual_markers_always_apply() {
        let line = "My address is ÷12 Grove St÷ ok";
        let out = censor(&wrap(line), line, false);
        assert_eq!(censored_texts(&out), vec!["12 Grove St"]);
        assert!(!markup::text_content(&out).contains('÷'));
    }

    #[test]
    fn test_escaping_preserved() {
        let line = "a < b costs $5";
        let out = censor(&wrap(line), line, true);
        assert!(out.contains("a &lt; b costs "));
        assert!(markup::is_balanced(&out));
    }
}
