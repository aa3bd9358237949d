//! Document model of the rendered chat log.
//!
//! One [`Block`] per input line, each a small tree of text, spans and breaks.
//! The palette edits spans in place and the export renderer walks the same
//! tree, so what is exported is always what was last rendered.

use crate::markup::{self, Token, CENSORED, COLORABLE, HIDDEN};
use crate::sanitize;
use crate::theme::{Rgba, Stylesheet};
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Identity of a colorable word: block index and ordinal among the block's
/// colorable spans in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WordId {
    pub block: usize,
    pub ordinal: usize,
}

impl WordId {
    pub fn new(block: usize, ordinal: usize) -> Self {
        Self { block, ordinal }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Span {
    pub classes: Vec<String>,
    /// Attributes other than `class`, in source order
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Span {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn is_colorable(&self) -> bool {
        self.has_class(COLORABLE)
    }

    pub fn is_censored(&self) -> bool {
        self.has_class(CENSORED)
    }

    pub fn is_hidden(&self) -> bool {
        self.has_class(HIDDEN)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }

    /// Replace every color class with `class`; marker classes are kept.
    pub fn set_color(&mut self, class: &str, stylesheet: &Stylesheet) {
        self.classes.retain(|c| !stylesheet.is_color_class(c));
        self.classes.insert(0, class.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Plain (unescaped) text
    Text(String),
    Span(Span),
    Break,
}

impl Node {
    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(t),
            Node::Span(s) => {
                for child in &s.children {
                    child.collect_text(out);
                }
            }
            Node::Break => out.push('\n'),
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(&sanitize::escape_text(t)),
            Node::Break => out.push_str("<br>"),
            Node::Span(s) => {
                let _ = write!(out, "<span class=\"{}\"", sanitize::escape_attr(&s.classes.join(" ")));
                for (k, v) in &s.attrs {
                    let _ = write!(out, " {}=\"{}\"", k, sanitize::escape_attr(v));
                }
                out.push('>');
                for child in &s.children {
                    child.write_html(out);
                }
                out.push_str("</span>");
            }
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Node::Text(t) => t.is_empty(),
            Node::Span(s) => s.children.is_empty(),
            Node::Break => false,
        }
    }
}

/// One rendered chat line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    /// Name of the classifier rule that produced the line
    pub category: String,
    pub nodes: Vec<Node>,
}

impl Block {
    /// Build a block from formatter markup. Stray closing tags are ignored
    /// and unclosed spans are closed at the end.
    pub fn parse(category: &str, markup_in: &str) -> Self {
        let mut stack: Vec<Span> = Vec::new();
        let mut root: Vec<Node> = Vec::new();

        fn push(stack: &mut [Span], root: &mut Vec<Node>, node: Node) {
            match stack.last_mut() {
                Some(top) => top.children.push(node),
                None => root.push(node),
            }
        }

        for token in markup::tokenize(markup_in) {
            match token {
                Token::Open { raw, .. } => {
                    let attrs = markup::attrs(raw)
                        .into_iter()
                        .filter(|(k, _)| k != "class")
                        .collect();
                    stack.push(Span {
                        classes: markup::classes(raw),
                        attrs,
                        children: Vec::new(),
                    });
                }
                Token::Close { .. } => {
                    if let Some(span) = stack.pop() {
                        push(&mut stack, &mut root, Node::Span(span));
                    }
                }
                Token::Break => push(&mut stack, &mut root, Node::Break),
                Token::Text(t) => {
                    let text = sanitize::unescape(t).into_owned();
                    push(&mut stack, &mut root, Node::Text(text));
                }
            }
        }

        while let Some(span) = stack.pop() {
            push(&mut stack, &mut root, Node::Span(span));
        }

        Self {
            category: category.to_string(),
            nodes: root,
        }
    }

    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.write_html(&mut out);
        }
        out
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            node.collect_text(&mut out);
        }
        out
    }

    /// Colorable spans in document order.
    pub fn words(&self) -> Vec<&Span> {
        fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a Span>) {
            for node in nodes {
                if let Node::Span(s) = node {
                    if s.is_colorable() {
                        out.push(s);
                    } else {
                        walk(&s.children, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }

    pub fn word_mut(&mut self, ordinal: usize) -> Option<&mut Span> {
        fn walk<'a>(nodes: &'a mut [Node], n: &mut usize) -> Option<&'a mut Span> {
            for node in nodes {
                if let Node::Span(s) = node {
                    if s.is_colorable() {
                        if *n == 0 {
                            return Some(s);
                        }
                        *n -= 1;
                    } else if let Some(found) = walk(&mut s.children, n) {
                        return Some(found);
                    }
                }
            }
            None
        }
        let mut n = ordinal;
        walk(&mut self.nodes, &mut n)
    }
}

/// The whole rendered output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// True when there is no visible chat text to export.
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.text().trim().is_empty())
    }

    pub fn word_ids(&self) -> Vec<WordId> {
        self.blocks
            .iter()
            .enumerate()
            .flat_map(|(bi, b)| (0..b.words().len()).map(move |wi| WordId::new(bi, wi)))
            .collect()
    }

    pub fn word(&self, id: WordId) -> Option<&Span> {
        self.blocks
            .get(id.block)
            .and_then(|b| b.words().get(id.ordinal).copied())
    }

    pub fn word_mut(&mut self, id: WordId) -> Option<&mut Span> {
        self.blocks.get_mut(id.block)?.word_mut(id.ordinal)
    }

    /// Swap the color class of a word; returns false for an unknown id.
    pub fn recolor(&mut self, id: WordId, class: &str, stylesheet: &Stylesheet) -> bool {
        match self.word_mut(id) {
            Some(span) => {
                span.set_color(class, stylesheet);
                true
            }
            None => false,
        }
    }

    /// Resolved color of a word, if any class resolves.
    pub fn word_color(&self, id: WordId, stylesheet: &Stylesheet) -> Option<Rgba> {
        self.word(id).and_then(|s| stylesheet.resolve(&s.classes))
    }

    /// Every class used by any span, sorted.
    pub fn classes(&self) -> BTreeSet<&str> {
        fn walk<'a>(nodes: &'a [Node], out: &mut BTreeSet<&'a str>) {
            for node in nodes {
                if let Node::Span(s) = node {
                    out.extend(s.classes.iter().map(String::as_str));
                    walk(&s.children, out);
                }
            }
        }
        let mut out = BTreeSet::new();
        for block in &self.blocks {
            walk(&block.nodes, &mut out);
        }
        out
    }

    /// HTML fragment: one `div.message` per block.
    pub fn to_html(&self) -> String {
        self.blocks
            .iter()
            .map(|b| format!("<div class=\"message\">{}</div>", b.to_markup()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Standalone HTML page with the stylesheet and optional background.
    pub fn to_page(&self, css: &str, background_data_url: Option<&str>) -> String {
        let body_style = background_data_url
            .map(|url| {
                format!(
                    " style=\"background: #000 url('{}') center / contain no-repeat;\"",
                    sanitize::escape_attr(url)
                )
            })
            .unwrap_or_default();
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n{}</style>\n</head>\n<body{}>\n<div class=\"generated\">\n{}\n</div>\n</body>\n</html>\n",
            css,
            body_style,
            self.to_html()
        )
    }
}

/// Cleanup after break insertion: drop empty text and spans, collapse
/// consecutive breaks and strip breaks at either end of the block.
pub fn tidy(block: &mut Block) {
    tidy_nodes(&mut block.nodes);

    while matches!(block.nodes.first(), Some(Node::Break)) {
        block.nodes.remove(0);
    }
    while matches!(block.nodes.last(), Some(Node::Break)) {
        block.nodes.pop();
    }
}

fn tidy_nodes(nodes: &mut Vec<Node>) {
    for node in nodes.iter_mut() {
        if let Node::Span(s) = node {
            tidy_nodes(&mut s.children);
        }
    }
    nodes.retain(|n| !n.is_empty());
    nodes.dedup_by(|a, b| matches!((a, b), (Node::Break, Node::Break)));
}
