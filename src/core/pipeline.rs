//! Raw transcript in, [`Document`] out.
//!
//! Each input line goes through: timestamp strip and normalization,
//! classification, censorship, word wrapping, break insertion, then parse
//! into a [`Block`] and cleanup.

use crate::censor;
use crate::classifier::{ClassifyContext, Classifier};
use crate::dom::{self, Block, Document};
use crate::linebreak;
use crate::markup;
use crate::sanitize;
use crate::words;

/// Settings that change the formatted output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    pub character_name: Option<String>,
    pub name_coloring_disabled: bool,
    pub censor: bool,
    pub max_line_length: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            character_name: None,
            name_coloring_disabled: false,
            censor: false,
            max_line_length: linebreak::DEFAULT_LINE_LENGTH,
        }
    }
}

impl FormatOptions {
    fn context(&self) -> ClassifyContext {
        let mut ctx = ClassifyContext::new(self.character_name.as_deref());
        ctx.name_coloring_disabled = self.name_coloring_disabled;
        ctx
    }
}

/// Stateless apart from the compiled rule table; cheap to share.
#[derive(Default)]
pub struct ChatFormatter {
    classifier: Classifier,
}

impl ChatFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format a single raw line. Blank lines yield `None`.
    pub fn format_line(&self, raw: &str, opts: &FormatOptions) -> Option<Block> {
        let normalized = sanitize::normalize_line(raw);
        let text = sanitize::strip_timestamp(&normalized).trim();
        if text.is_empty() {
            return None;
        }

        let ctx = opts.context();
        let classified = self.classifier.classify(text, &ctx);
        let censored = censor::censor(&classified.markup, text, opts.censor);
        let wrapped = words::wrap_words(&censored);
        let broken = linebreak::insert_breaks(&wrapped, opts.max_line_length);
        debug_assert!(markup::is_balanced(&broken), "unbalanced markup: {}", broken);

        let mut block = Block::parse(classified.rule, &broken);
        dom::tidy(&mut block);
        Some(block)
    }

    /// Format a whole transcript, one block per non-blank line.
    pub fn format(&self, input: &str, opts: &FormatOptions) -> Document {
        let blocks: Vec<Block> = input
            .lines()
            .filter_map(|line| self.format_line(line, opts))
            .collect();
        tracing::debug!("formatted {} lines into {} blocks", input.lines().count(), blocks.len());
        Document::new(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Node;
    use pretty_assertions::assert_eq;

    fn opts(name: Option<&str>) -> FormatOptions {
        FormatOptions {
            character_name: name.map(str::to_string),
            ..Default::default()
        }
    }

    fn word_classes(block: &Block) -> Vec<String> {
        block.words().iter().map(|w| w.classes[0].clone()).collect()
    }

    #[test]
    fn test_blank_and_timestamp_only_lines_skipped() {
        let f = ChatFormatter::new();
        let doc = f.format("\n   \n[12:00:01] \nhello\n", &opts(None));
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].text(), "hello");
    }

    #[test]
    fn test_timestamp_stripped() {
        let f = ChatFormatter::new();
        let block = f.format_line("[10:11:12] Bob says: hi", &opts(None)).expect("block");
        assert_eq!(block.text(), "Bob says: hi");
        assert_eq!(block.category, "speech");
    }

    #[test]
    fn test_own_speech_white_other_lightgrey() {
        let f = ChatFormatter::new();
        let own = f.format_line("Alice says: hi there", &opts(Some("Alice"))).expect("block");
        assert!(word_classes(&own).iter().all(|c| c == "white"));
        let other = f.format_line("Bob says: hi there", &opts(Some("Alice"))).expect("block");
        assert!(word_classes(&other).iter().all(|c| c == "lightgrey"));
    }

    #[test]
    fn test_every_word_is_colorable() {
        let f = ChatFormatter::new();
        let block = f
            .format_line("[INFO]: You have shared your number with Bob.", &opts(None))
            .expect("block");
        let words: Vec<String> = block.words().iter().map(|w| w.text()).collect();
        assert_eq!(
            words,
            vec!["[INFO]:", "You", "have", "shared", "your", "number", "with", "Bob", "."]
        );
    }

    #[test]
    fn test_censored_amount_kept_hidden() {
        let f = ChatFormatter::new();
        let o = FormatOptions {
            censor: true,
            ..opts(None)
        };
        let block = f.format_line("You have received $5,000 from Bob.", &o).expect("block");
        let hidden: Vec<&Node> = block
            .nodes
            .iter()
            .filter(|n| matches!(n, Node::Span(s) if s.is_censored()))
            .collect();
        assert_eq!(hidden.len(), 1);
        assert_eq!(block.text(), "You have received $5,000 from Bob.");
    }

    #[test]
    fn test_long_line_is_broken() {
        let f = ChatFormatter::new();
        let o = FormatOptions {
            max_line_length: 20,
            ..opts(None)
        };
        let block = f
            .format_line("Bob says: this line is long enough to need at least two breaks", &o)
            .expect("block");
        let lines = block.text();
        assert!(lines.lines().count() >= 3);
        assert!(lines.lines().all(|l| l.chars().count() <= 20));
    }

    #[test]
    fn test_quotes_normalized() {
        let f = ChatFormatter::new();
        let block = f.format_line("Bob says: it\u{2019}s fine", &opts(None)).expect("block");
        assert_eq!(block.text(), "Bob says: it's fine");
    }
}
