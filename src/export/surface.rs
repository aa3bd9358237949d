//! Drawing targets for the export renderer.

use super::ExportError;
use crate::overlay::Rect;
use crate::theme::Rgba;
use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use std::path::{Path, PathBuf};
use tiny_skia::{Color, FilterQuality, Pixmap, PixmapPaint, PremultipliedColorU8, Transform};

/// The operations the renderer needs from a canvas.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn fill(&mut self, color: Rgba);
    fn draw_image(&mut self, image: &image::RgbaImage, dest: Rect);
    /// Advance width of `text` at `size` pixels.
    fn measure(&self, text: &str, size: f32) -> f32;
    /// Distance from the top of the em box to the baseline.
    fn ascent(&self, size: f32) -> f32;
    fn draw_text(&mut self, text: &str, x: f32, baseline: f32, size: f32, color: Rgba);
    fn encode_png(&self) -> Result<Vec<u8>, ExportError>;
}

/// Bold sans fonts tried when no font is configured.
const SYSTEM_FONTS: &[&str] = &[
    "arialbd.ttf",
    "Arial Bold.ttf",
    "DejaVuSans-Bold.ttf",
    "LiberationSans-Bold.ttf",
    "FreeSansBold.ttf",
    "NotoSans-Bold.ttf",
    "Ubuntu-B.ttf",
    "Arial.ttf",
    "arial.ttf",
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
];

fn font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("/System/Library/Fonts/Supplemental"),
        PathBuf::from("C:\\Windows\\Fonts"),
    ];
    if let Some(home) = dirs::home_dir() {
        dirs.push(home.join(".fonts"));
        dirs.push(home.join(".local/share/fonts"));
        dirs.push(home.join("Library/Fonts"));
    }
    dirs
}

fn find_file(dir: &Path, name: &str, depth: usize) -> Option<PathBuf> {
    let candidate = dir.join(name);
    if candidate.is_file() {
        return Some(candidate);
    }
    if depth == 0 {
        return None;
    }
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .find_map(|p| find_file(&p, name, depth - 1))
}

/// Load the configured font, or the first system font found.
pub fn load_font(configured: Option<&Path>) -> Result<FontVec, ExportError> {
    if let Some(path) = configured {
        let bytes = std::fs::read(path)
            .map_err(|e| ExportError::FontUnavailable(format!("{}: {}", path.display(), e)))?;
        return FontVec::try_from_vec(bytes)
            .map_err(|e| ExportError::FontUnavailable(format!("{}: {}", path.display(), e)));
    }

    let dirs = font_dirs();
    for name in SYSTEM_FONTS {
        for dir in &dirs {
            let Some(path) = find_file(dir, name, 3) else {
                continue;
            };
            match std::fs::read(&path).map(FontVec::try_from_vec) {
                Ok(Ok(font)) => {
                    tracing::debug!("using font {}", path.display());
                    return Ok(font);
                }
                _ => tracing::debug!("skipping unreadable font {}", path.display()),
            }
        }
    }

    Err(ExportError::FontUnavailable(
        "no system font found; set export.font_path in config.toml".to_string(),
    ))
}

/// Raster surface backed by a tiny-skia pixmap.
pub struct PixmapSurface {
    pixmap: Pixmap,
    font: FontVec,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32, font: FontVec) -> Result<Self, ExportError> {
        let pixmap = Pixmap::new(width, height).ok_or(ExportError::Canvas(width, height))?;
        Ok(Self { pixmap, font })
    }

    fn blend(&mut self, x: i32, y: i32, color: Rgba, coverage: f32) {
        let (w, h) = (self.pixmap.width() as i32, self.pixmap.height() as i32);
        if x < 0 || y < 0 || x >= w || y >= h || coverage <= 0.0 {
            return;
        }
        let idx = (y * w + x) as usize;
        let Some(dst) = self.pixmap.pixels_mut().get_mut(idx) else {
            return;
        };

        let sa = (color.a as f32 / 255.0) * coverage.min(1.0);
        let inv = 1.0 - sa;
        let mix = |s: u8, d: u8| (s as f32 * sa + d as f32 * inv).round().clamp(0.0, 255.0) as u8;
        let a = (sa * 255.0 + dst.alpha() as f32 * inv).round().clamp(0.0, 255.0) as u8;
        let r = mix(color.r, dst.red()).min(a);
        let g = mix(color.g, dst.green()).min(a);
        let b = mix(color.b, dst.blue()).min(a);
        if let Some(px) = PremultipliedColorU8::from_rgba(r, g, b, a) {
            *dst = px;
        }
    }
}

impl Surface for PixmapSurface {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn fill(&mut self, color: Rgba) {
        self.pixmap
            .fill(Color::from_rgba8(color.r, color.g, color.b, color.a));
    }

    fn draw_image(&mut self, image: &image::RgbaImage, dest: Rect) {
        let (w, h) = image.dimensions();
        let Some(mut src) = Pixmap::new(w, h) else {
            tracing::warn!("background image {}x{} could not be allocated", w, h);
            return;
        };
        for (dst, px) in src.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = px.0;
            *dst = tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply();
        }
        let transform = Transform::from_row(
            dest.w / w as f32,
            0.0,
            0.0,
            dest.h / h as f32,
            dest.x,
            dest.y,
        );
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..Default::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, src.as_ref(), &paint, transform, None);
    }

    fn measure(&self, text: &str, size: f32) -> f32 {
        let font = self.font.as_scaled(PxScale::from(size));
        let mut width = 0.0;
        let mut prev = None;
        for c in text.chars() {
            let id = font.glyph_id(c);
            if let Some(p) = prev {
                width += font.kern(p, id);
            }
            width += font.h_advance(id);
            prev = Some(id);
        }
        width
    }

    fn ascent(&self, size: f32) -> f32 {
        self.font.as_scaled(PxScale::from(size)).ascent()
    }

    fn draw_text(&mut self, text: &str, x: f32, baseline: f32, size: f32, color: Rgba) {
        let scale = PxScale::from(size);
        let mut glyphs = Vec::new();
        {
            let font = self.font.as_scaled(scale);
            let mut caret = x;
            let mut prev = None;
            for c in text.chars() {
                let id = font.glyph_id(c);
                if let Some(p) = prev {
                    caret += font.kern(p, id);
                }
                glyphs.push(id.with_scale_and_position(scale, point(caret, baseline)));
                caret += font.h_advance(id);
                prev = Some(id);
            }
        }

        let mut coverage = Vec::new();
        for glyph in glyphs {
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                outlined.draw(|gx, gy, c| {
                    coverage.push((bounds.min.x as i32 + gx as i32, bounds.min.y as i32 + gy as i32, c));
                });
            }
        }
        for (px, py, c) in coverage {
            self.blend(px, py, color, c);
        }
    }

    fn encode_png(&self) -> Result<Vec<u8>, ExportError> {
        self.pixmap
            .encode_png()
            .map_err(|e| ExportError::Encode(e.to_string()))
    }
}

/// One recorded drawing call.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill(Rgba),
    Image(Rect),
    Text {
        text: String,
        x: f32,
        baseline: f32,
        size: f32,
        color: Rgba,
    },
}

/// Test double: records calls, measures every char as half the font size.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    pub width: u32,
    pub height: u32,
    pub ops: Vec<DrawOp>,
}

#[cfg(test)]
impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    /// Text calls drawn in `color`.
    pub fn texts_in(&self, color: Rgba) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, color: c, .. } if *c == color => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
impl Surface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fill(&mut self, color: Rgba) {
        self.ops.push(DrawOp::Fill(color));
    }

    fn draw_image(&mut self, _image: &image::RgbaImage, dest: Rect) {
        self.ops.push(DrawOp::Image(dest));
    }

    fn measure(&self, text: &str, size: f32) -> f32 {
        text.chars().count() as f32 * size * 0.5
    }

    fn ascent(&self, size: f32) -> f32 {
        size * 0.8
    }

    fn draw_text(&mut self, text: &str, x: f32, baseline: f32, size: f32, color: Rgba) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            baseline,
            size,
            color,
        });
    }

    fn encode_png(&self) -> Result<Vec<u8>, ExportError> {
        let pixmap = Pixmap::new(self.width, self.height)
            .ok_or(ExportError::Canvas(self.width, self.height))?;
        pixmap
            .encode_png()
            .map_err(|e| ExportError::Encode(e.to_string()))
    }
}
