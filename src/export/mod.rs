//! PNG export of the rendered chat.
//!
//! The renderer reproduces the preview: optional black fill, the background
//! image contained and transformed, then the chat lines with an 8-way black
//! outline under every visible run.

pub mod dpi;
pub mod layout;
pub mod surface;

pub use layout::{ExportSettings, Geometry, Run, VisualLine};
pub use surface::{load_font, PixmapSurface, Surface};
#[cfg(test)]
pub use surface::RecordingSurface;

use crate::background::{Background, BackgroundError};
use crate::dom::Document;
use crate::overlay::{ImageTransform, Size};
use crate::theme::{Rgba, Stylesheet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("nothing to export: the chat output is empty")]
    NoContent,
    #[error("an export is already in progress")]
    Busy,
    #[error("no usable font: {0}")]
    FontUnavailable(String),
    #[error("failed to allocate a {0}x{1} canvas")]
    Canvas(u32, u32),
    #[error(transparent)]
    Background(#[from] BackgroundError),
    #[error("failed to encode PNG: {0}")]
    Encode(String),
}

/// Everything one export reads.
#[derive(Debug, Clone, Copy)]
pub struct ExportJob<'a> {
    pub document: &'a Document,
    pub stylesheet: &'a Stylesheet,
    pub settings: &'a ExportSettings,
    /// Preview size the transforms were recorded in
    pub preview: Size,
    pub chat: ImageTransform,
    pub image: ImageTransform,
    pub background: Option<&'a Background>,
}

const OUTLINE_DIRECTIONS: [(f32, f32); 8] = [
    (-1.0, -1.0),
    (0.0, -1.0),
    (1.0, -1.0),
    (-1.0, 0.0),
    (1.0, 0.0),
    (-1.0, 1.0),
    (0.0, 1.0),
    (1.0, 1.0),
];

/// Clears the in-flight flag when dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs exports one at a time.
#[derive(Debug, Default)]
pub struct Exporter {
    in_flight: AtomicBool,
}

impl Exporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<BusyGuard<'_>, ExportError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExportError::Busy)?;
        Ok(BusyGuard(&self.in_flight))
    }

    /// Render to a raster surface with the given (or a system) font and
    /// return PNG bytes carrying the configured DPI.
    pub fn export_png(&self, job: &ExportJob<'_>, font_path: Option<&Path>) -> Result<Vec<u8>, ExportError> {
        let _guard = self.begin()?;
        if job.document.is_empty() {
            return Err(ExportError::NoContent);
        }
        let font = load_font(font_path)?;
        let mut surface = PixmapSurface::new(job.settings.width, job.settings.height, font)?;
        render(&mut surface, job)?;
        let bytes = surface.encode_png()?;
        tracing::info!(
            "exported {}x{} PNG ({} bytes)",
            job.settings.width,
            job.settings.height,
            bytes.len()
        );
        Ok(dpi::embed_dpi(bytes, job.settings.dpi))
    }

    /// Same as [`Exporter::export_png`] on a caller-provided surface.
    pub fn export_with<S: Surface>(&self, surface: &mut S, job: &ExportJob<'_>) -> Result<Vec<u8>, ExportError> {
        let _guard = self.begin()?;
        if job.document.is_empty() {
            return Err(ExportError::NoContent);
        }
        render(surface, job)?;
        let bytes = surface.encode_png()?;
        Ok(dpi::embed_dpi(bytes, job.settings.dpi))
    }
}

/// Draw the job onto `surface`.
pub fn render<S: Surface>(surface: &mut S, job: &ExportJob<'_>) -> Result<(), ExportError> {
    if job.document.is_empty() {
        return Err(ExportError::NoContent);
    }

    let image = job.background.map(|bg| (bg.natural_size(), &job.image));
    let geo = layout::geometry(job.settings, job.preview, &job.chat, image);

    surface.fill(if job.settings.black_background {
        Rgba::BLACK
    } else {
        Rgba::TRANSPARENT
    });

    if let (Some(bg), Some(rect)) = (job.background, geo.image_rect) {
        surface.draw_image(&bg.image, rect);
    }

    let lines = layout::visual_lines(job.document, job.stylesheet);
    let half_leading = (geo.line_px - geo.font_px) / 2.0;
    let ascent = surface.ascent(geo.font_px);

    for (i, line) in lines.iter().enumerate() {
        let top = geo.chat_origin.y + i as f32 * geo.line_px;
        if top > surface.height() as f32 {
            break;
        }
        let baseline = top + half_leading + ascent;
        let mut x = geo.chat_origin.x;

        for run in &line.runs {
            let advance = surface.measure(&run.text, geo.font_px);
            if let Some(color) = run.color {
                if !run.text.trim().is_empty() {
                    for (dx, dy) in OUTLINE_DIRECTIONS {
                        surface.draw_text(
                            &run.text,
                            x + dx * geo.outline_px,
                            baseline + dy * geo.outline_px,
                            geo.font_px,
                            Rgba::BLACK,
                        );
                    }
                    surface.draw_text(&run.text, x, baseline, geo.font_px, color);
                }
            }
            x += advance;
        }
    }

    tracing::debug!("rendered {} visual lines", lines.len());
    Ok(())
}
