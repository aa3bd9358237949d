//! Typed layout model the raster renderer draws from.
//!
//! Runs are derived from the rendered [`Document`], so palette recoloring is
//! picked up here through the stylesheet rather than re-derived from input.

use crate::dom::{Document, Node};
use crate::events::Point;
use crate::overlay::{contain_rect, ImageTransform, Rect, Size};
use crate::theme::{Rgba, Stylesheet};

/// A stretch of text drawn in one color.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    /// `None` for hidden text, which takes up space but is not drawn
    pub color: Option<Rgba>,
}

impl Run {
    pub fn is_hidden(&self) -> bool {
        self.color.is_none()
    }
}

/// One line of output as it appears in the preview.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisualLine {
    pub runs: Vec<Run>,
}

impl VisualLine {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    fn push(&mut self, text: &str, color: Option<Rgba>) {
        if text.is_empty() {
            return;
        }
        match self.runs.last_mut() {
            Some(last) if last.color == color => last.text.push_str(text),
            _ => self.runs.push(Run {
                text: text.to_string(),
                color,
            }),
        }
    }
}

/// Split the document into visual lines: each block starts a new line and
/// every `<br>` ends one.
pub fn visual_lines(doc: &Document, stylesheet: &Stylesheet) -> Vec<VisualLine> {
    let mut lines = Vec::new();
    for block in &doc.blocks {
        let mut current = VisualLine::default();
        walk(&block.nodes, stylesheet, stylesheet.default_color, false, &mut current, &mut lines);
        lines.push(current);
    }
    lines
}

fn walk(
    nodes: &[Node],
    stylesheet: &Stylesheet,
    color: Rgba,
    hidden: bool,
    current: &mut VisualLine,
    lines: &mut Vec<VisualLine>,
) {
    for node in nodes {
        match node {
            Node::Text(t) => current.push(t, (!hidden).then_some(color)),
            Node::Break => lines.push(std::mem::take(current)),
            Node::Span(span) => {
                let color = stylesheet.resolve(&span.classes).unwrap_or(color);
                walk(
                    &span.children,
                    stylesheet,
                    color,
                    hidden || span.is_hidden(),
                    current,
                    lines,
                );
            }
        }
    }
}

/// Settings of one export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub padding_x: f32,
    pub padding_y: f32,
    pub font_size: f32,
    pub line_height: f32,
    /// Opaque black fill behind everything
    pub black_background: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            dpi: 96,
            padding_x: 10.0,
            padding_y: 10.0,
            font_size: 12.0,
            line_height: 1.35,
            black_background: true,
        }
    }
}

/// Where things go on the export canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Export size divided by preview size, per axis
    pub ratio_x: f32,
    pub ratio_y: f32,
    /// Top-left of the chat block after translation
    pub chat_origin: Point,
    pub chat_scale: f32,
    pub font_px: f32,
    pub line_px: f32,
    pub outline_px: f32,
    /// Destination of the background image, if any
    pub image_rect: Option<Rect>,
}

/// Map preview-space transforms onto the export canvas. Offsets are scaled
/// by the size ratio; scale factors are used as is.
pub fn geometry(
    settings: &ExportSettings,
    preview: Size,
    chat: &ImageTransform,
    image: Option<(Size, &ImageTransform)>,
) -> Geometry {
    let width = settings.width as f32;
    let height = settings.height as f32;
    let ratio_x = if preview.w > 0.0 { width / preview.w } else { 1.0 };
    let ratio_y = if preview.h > 0.0 { height / preview.h } else { 1.0 };

    let image_rect = image.map(|(natural, t)| {
        let canvas = Rect::new(0.0, 0.0, width, height);
        let rescaled = ImageTransform::new(t.offset_x * ratio_x, t.offset_y * ratio_y, t.scale);
        rescaled.apply(contain_rect(natural, canvas), canvas.center())
    });

    let font_px = settings.font_size * chat.scale;
    Geometry {
        ratio_x,
        ratio_y,
        chat_origin: Point::new(
            settings.padding_x + chat.offset_x * ratio_x,
            settings.padding_y + chat.offset_y * ratio_y,
        ),
        chat_scale: chat.scale,
        font_px,
        line_px: font_px * settings.line_height,
        outline_px: chat.scale,
        image_rect,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Block;
    use pretty_assertions::assert_eq;

    fn doc(markup: &str) -> Document {
        Document::new(vec![Block::parse("x", markup)])
    }

    #[test]
    fn test_breaks_and_blocks_split_lines() {
        let sheet = Stylesheet::builtin();
        let mut d = doc("<span class=\"white colorable\">a</span> <span class=\"white colorable\">b</span><br><span class=\"grey colorable\">c</span>");
        d.blocks.push(Block::parse("y", "<span class=\"green colorable\">d</span>"));
        let lines = visual_lines(&d, &sheet);
        let texts: Vec<String> = lines.iter().map(VisualLine::text).collect();
        assert_eq!(texts, vec!["a b", "c", "d"]);
    }

    #[test]
    fn test_adjacent_same_color_runs_merge() {
        let sheet = Stylesheet::builtin();
        let d = doc("<span class=\"white colorable\">a</span> <span class=\"white colorable\">b</span>");
        let lines = visual_lines(&d, &sheet);
        assert_eq!(lines[0].runs.len(), 1);
        assert_eq!(lines[0].runs[0].color, Some(Rgba::WHITE));
    }

    #[test]
    fn test_hidden_runs_have_no_color() {
        let sheet = Stylesheet::builtin();
        let d = doc("<span class=\"white colorable\">paid</span> <span class=\"hidden censored\" data-original=\"$5\">$5</span>");
        let runs = &visual_lines(&d, &sheet)[0].runs;
        assert_eq!(runs.last().map(|r| r.text.as_str()), Some("$5"));
        assert!(runs.last().is_some_and(Run::is_hidden));
    }

    #[test]
    fn test_recolor_is_reflected() {
        let sheet = Stylesheet::builtin();
        let mut d = doc("<span class=\"white colorable\">a</span>");
        d.recolor(crate::dom::WordId::new(0, 0), "orange", &sheet);
        let runs = &visual_lines(&d, &sheet)[0].runs;
        assert_eq!(runs[0].color, sheet.class_color("orange"));
    }

    #[test]
    fn test_geometry_rescales_offsets_not_scale() {
        let settings = ExportSettings {
            width: 1600,
            height: 1200,
            ..Default::default()
        };
        let chat = ImageTransform::new(10.0, 20.0, 2.0);
        let g = geometry(&settings, Size::new(800.0, 600.0), &chat, None);
        assert_eq!(g.ratio_x, 2.0);
        assert_eq!(g.chat_origin, Point::new(30.0, 50.0));
        assert_eq!(g.chat_scale, 2.0);
        assert_eq!(g.font_px, 24.0);
        assert!((g.line_px - 32.4).abs() < 1e-4);
        assert_eq!(g.image_rect, None);
    }

    #[test]
    fn test_geometry_places_contained_image() {
        let settings = ExportSettings::default();
        let t = ImageTransform::new(5.0, 0.0, 1.0);
        let g = geometry(
            &settings,
            Size::new(400.0, 300.0),
            &ImageTransform::default(),
            Some((Size::new(1600.0, 600.0), &t)),
        );
        assert_eq!(g.image_rect, Some(Rect::new(10.0, 150.0, 800.0, 300.0)));
    }
}
