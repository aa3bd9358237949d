//! Session controller: the single owner of all mutable state.
//!
//! A frontend feeds input text, setting changes and pointer events in and
//! reads the document, HTML and PNG out. Nothing here is global.

use super::debounce::{Change, RecomputeScheduler};
use super::pipeline::{ChatFormatter, FormatOptions};
use crate::background::{self, Background, DropZone, DropZoneState};
use crate::config::Config;
use crate::dom::Document;
use crate::events::{Key, Point, PointerEvent};
use crate::export::{layout, ExportError, ExportJob, ExportSettings, Exporter, Surface};
use crate::linebreak;
use crate::overlay::{OverlayController, Size};
use crate::selection::ColorPalette;
use crate::store::Store;
use crate::theme::Stylesheet;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Average glyph advance as a fraction of the font size, for sizing the
/// chat block before a frontend has measured it.
const AVG_GLYPH_EM: f32 = 0.6;

pub struct Session {
    formatter: ChatFormatter,
    options: FormatOptions,
    input: String,
    document: Document,
    stylesheet: Stylesheet,
    export_settings: ExportSettings,
    font_path: Option<PathBuf>,
    palette: ColorPalette,
    overlay: OverlayController,
    drop_zone: DropZone,
    background: Option<Background>,
    exporter: Exporter,
    store: Store,
    scheduler: RecomputeScheduler,
}

impl Session {
    pub fn new(config: &Config, store: Store) -> Self {
        let mut options = config.format_options();
        if options.character_name.is_none() {
            options.character_name = store.last_character();
        }
        let export_settings = config.export_settings();
        let origin = Point::new(export_settings.padding_x, export_settings.padding_y);

        Self {
            formatter: ChatFormatter::new(),
            options,
            input: String::new(),
            document: Document::default(),
            stylesheet: config.stylesheet(),
            export_settings,
            font_path: config.export.font_path.clone(),
            palette: ColorPalette::new(),
            overlay: OverlayController::new(config.preview_size(), origin),
            drop_zone: DropZone::new(config.export.max_background_bytes),
            background: None,
            exporter: Exporter::new(),
            store,
            scheduler: RecomputeScheduler::default(),
        }
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn options(&self) -> &FormatOptions {
        &self.options
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    pub fn export_settings(&self) -> &ExportSettings {
        &self.export_settings
    }

    pub fn palette(&self) -> &ColorPalette {
        &self.palette
    }

    pub fn overlay(&self) -> &OverlayController {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut OverlayController {
        &mut self.overlay
    }

    pub fn drop_zone(&self) -> &DropZone {
        &self.drop_zone
    }

    pub fn background(&self) -> Option<&Background> {
        self.background.as_ref()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn is_exporting(&self) -> bool {
        self.exporter.is_busy()
    }

    // --- inputs ---

    pub fn set_input(&mut self, text: impl Into<String>, now: Instant) {
        self.input = text.into();
        self.scheduler.notify(Change::Text, now);
    }

    pub fn set_character_name(&mut self, name: Option<&str>, now: Instant) {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        if let Some(n) = name {
            if let Err(e) = self.store.remember_character(n) {
                tracing::warn!("could not record character name: {}", e);
            }
        }
        self.options.character_name = name.map(str::to_string);
        self.scheduler.notify(Change::Settings, now);
    }

    pub fn set_censor(&mut self, on: bool, now: Instant) {
        self.options.censor = on;
        self.scheduler.notify(Change::Settings, now);
    }

    pub fn set_name_coloring_disabled(&mut self, disabled: bool, now: Instant) {
        self.options.name_coloring_disabled = disabled;
        self.scheduler.notify(Change::Settings, now);
    }

    pub fn set_max_line_length(&mut self, max_len: usize, now: Instant) {
        self.options.max_line_length = linebreak::clamp_line_length(max_len);
        self.scheduler.notify(Change::Settings, now);
    }

    /// Export settings do not change the markup, only its presentation.
    pub fn set_export_settings(&mut self, settings: ExportSettings) {
        self.overlay
            .set_chat_origin(Point::new(settings.padding_x, settings.padding_y));
        self.export_settings = settings;
        self.update_chat_size();
    }

    pub fn set_font_path(&mut self, path: Option<PathBuf>) {
        self.font_path = path;
    }

    pub fn set_preview_size(&mut self, size: Size) {
        self.overlay.set_viewport(size);
    }

    // --- recompute ---

    /// Run a due recompute. Returns true if the document was rebuilt.
    pub fn poll(&mut self, now: Instant) -> bool {
        if !self.scheduler.poll(now) {
            return false;
        }
        self.reformat();
        true
    }

    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        self.scheduler.next_deadline(now)
    }

    /// Rebuild the document from the current input and options. Manual
    /// recoloring does not survive a rebuild.
    pub fn reformat(&mut self) {
        self.document = self.formatter.format(&self.input, &self.options);
        self.palette.clear_selection();
        self.update_chat_size();
        tracing::debug!("reformatted into {} blocks", self.document.blocks.len());
    }

    fn update_chat_size(&mut self) {
        let lines = layout::visual_lines(&self.document, &self.stylesheet);
        let longest = lines
            .iter()
            .map(|l| l.text().chars().count())
            .max()
            .unwrap_or(0);
        let font = self.export_settings.font_size;
        self.overlay.set_chat_size(Size::new(
            longest as f32 * font * AVG_GLYPH_EM,
            lines.len() as f32 * font * self.export_settings.line_height,
        ));
    }

    // --- interaction ---

    /// Pointer input goes to the palette in coloring mode, otherwise to the
    /// pan/zoom overlay.
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        if self.palette.is_active() {
            self.palette.handle_pointer(event, &self.document);
        } else {
            self.overlay.handle_pointer(event);
        }
    }

    pub fn handle_key(&mut self, key: Key) {
        self.palette.handle_key(key);
    }

    pub fn set_coloring_mode(&mut self, on: bool) {
        self.palette.set_active(on);
    }

    pub fn toggle_coloring_mode(&mut self) {
        self.palette.toggle();
    }

    /// Recolor the selected words. Returns how many changed.
    pub fn apply_color(&mut self, class: &str) -> usize {
        let changed = self
            .palette
            .apply_color(class, &mut self.document, &self.stylesheet);
        tracing::debug!("applied '{}' to {} words", class, changed);
        changed
    }

    // --- background ---

    /// Load a background from disk. On failure the drop zone holds the error.
    pub fn load_background(&mut self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.drop_zone.begin(&name);
        let result = background::load(path, self.drop_zone.max_bytes);
        let loaded = self.drop_zone.finish(result);
        self.install_background(loaded)
    }

    /// A dropped or pasted file.
    pub fn accept_background(&mut self, name: &str, bytes: Vec<u8>) -> bool {
        let loaded = self.drop_zone.accept(name, bytes);
        self.install_background(loaded)
    }

    fn install_background(&mut self, loaded: Option<Background>) -> bool {
        match loaded {
            Some(bg) => {
                self.overlay.set_image(Some(bg.natural_size()));
                self.background = Some(bg);
                true
            }
            None => false,
        }
    }

    pub fn background_error(&self) -> Option<&str> {
        match self.drop_zone.state() {
            DropZoneState::Idle { error } => error.as_deref(),
            _ => None,
        }
    }

    pub fn clear_background(&mut self) {
        self.background = None;
        self.overlay.set_image(None);
        self.drop_zone.clear();
    }

    // --- output ---

    pub fn html_fragment(&self) -> String {
        self.document.to_html()
    }

    /// Standalone page with the stylesheet and the background embedded.
    pub fn html_page(&self) -> String {
        let css = self.stylesheet.to_css(
            self.export_settings.font_size.round() as u32,
            self.export_settings.line_height,
            self.document.classes(),
        );
        let url = self.background.as_ref().map(Background::data_url);
        self.document.to_page(&css, url.as_deref())
    }

    pub fn plain_text(&self) -> String {
        self.document
            .blocks
            .iter()
            .map(|b| b.text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn export_job(&self) -> ExportJob<'_> {
        ExportJob {
            document: &self.document,
            stylesheet: &self.stylesheet,
            settings: &self.export_settings,
            preview: self.overlay.viewport(),
            chat: self.overlay.chat,
            image: self.overlay.image,
            background: self.background.as_ref(),
        }
    }

    pub fn export_png(&self) -> Result<Vec<u8>, ExportError> {
        self.exporter
            .export_png(&self.export_job(), self.font_path.as_deref())
    }

    pub fn export_with<S: Surface>(&self, surface: &mut S) -> Result<Vec<u8>, ExportError> {
        self.exporter.export_with(surface, &self.export_job())
    }

    /// Write the key-value store back to disk.
    pub fn persist(&self) -> anyhow::Result<()> {
        self.store.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::WordId;
    use crate::events::{Modifiers, Target};
    use crate::export::RecordingSurface;
    use crate::theme::Rgba;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn session() -> Session {
        Session::new(&Config::default(), Store::empty("unused-store.json"))
    }

    fn settle(s: &mut Session, now: Instant) {
        assert!(s.poll(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_text_is_debounced() {
        let mut s = session();
        let t0 = Instant::now();
        s.set_input("Alice says: Hi.", t0);
        assert!(!s.poll(t0));
        assert!(s.document().blocks.is_empty());
        assert!(s.poll(t0 + Duration::from_millis(300)));
        assert_eq!(s.document().blocks.len(), 1);
    }

    #[test]
    fn test_recompute_reads_latest_input() {
        let mut s = session();
        let t0 = Instant::now();
        s.set_input("first line", t0);
        s.set_input("first line\nsecond line", t0 + Duration::from_millis(100));
        settle(&mut s, t0);
        assert_eq!(s.document().blocks.len(), 2);
    }

    #[test]
    fn test_settings_apply_immediately() {
        let mut s = session();
        let t0 = Instant::now();
        s.set_input("Alice says: Hi.", t0);
        settle(&mut s, t0);
        let before = s.html_fragment();

        s.set_character_name(Some("Alice"), t0);
        assert!(s.poll(t0));
        assert_ne!(s.html_fragment(), before);
        assert_eq!(s.store().last_character().as_deref(), Some("Alice"));
    }

    #[test]
    fn test_line_length_is_clamped() {
        let mut s = session();
        s.set_max_line_length(2, Instant::now());
        assert_eq!(s.options().max_line_length, linebreak::MIN_LINE_LENGTH);
    }

    #[test]
    fn test_last_character_is_restored() {
        let mut store = Store::empty("unused-store.json");
        store.remember_character("Bob").expect("remember");
        let s = Session::new(&Config::default(), store);
        assert_eq!(s.options().character_name.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_pointer_routing_follows_coloring_mode() {
        let mut s = session();
        let t0 = Instant::now();
        s.set_input("Alice says: Hello there.", t0);
        settle(&mut s, t0);

        let word = WordId::new(0, 0);
        let down = PointerEvent::Down {
            pos: Point::new(20.0, 20.0),
            target: Target::Word(word),
            modifiers: Modifiers::NONE,
        };

        // overlay mode: a press on a word starts a chat pan
        s.handle_pointer(down);
        assert!(s.overlay().is_panning());
        assert!(s.palette().selection().is_empty());
        s.handle_pointer(PointerEvent::Leave);

        s.set_coloring_mode(true);
        s.handle_pointer(down);
        assert!(!s.overlay().is_panning());
        assert!(s.palette().selection().contains(word));
        s.handle_pointer(PointerEvent::Up {
            pos: Point::new(20.0, 20.0),
        });

        assert_eq!(s.apply_color("orange"), 1);
        assert_eq!(
            s.document().word_color(word, s.stylesheet()),
            s.stylesheet().class_color("orange")
        );
    }

    #[test]
    fn test_reformat_drops_selection_and_recoloring() {
        let mut s = session();
        let t0 = Instant::now();
        s.set_input("Alice says: Hello.", t0);
        settle(&mut s, t0);
        s.set_coloring_mode(true);
        let word = WordId::new(0, 0);
        s.handle_pointer(PointerEvent::Down {
            pos: Point::default(),
            target: Target::Word(word),
            modifiers: Modifiers::NONE,
        });
        s.apply_color("orange");

        s.set_censor(true, t0);
        assert!(s.poll(t0));
        assert!(s.palette().selection().is_empty());
        assert_ne!(
            s.document().word_color(word, s.stylesheet()),
            s.stylesheet().class_color("orange")
        );
    }

    #[test]
    fn test_export_refuses_empty_document() {
        let s = session();
        let mut surface = RecordingSurface::new(800, 600);
        assert!(matches!(s.export_with(&mut surface), Err(ExportError::NoContent)));
    }

    #[test]
    fn test_export_draws_current_document() {
        let mut s = session();
        let t0 = Instant::now();
        s.set_input("Alice says: Hello.", t0);
        settle(&mut s, t0);
        let mut surface = RecordingSurface::new(800, 600);
        s.export_with(&mut surface).expect("export");
        assert!(!surface.texts_in(Rgba::BLACK).is_empty());
        assert!(!s.is_exporting());
    }

    #[test]
    fn test_background_lifecycle() {
        let mut s = session();
        let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([1, 2, 3, 255]));
        let mut png = std::io::Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).expect("encode");

        assert!(s.accept_background("bg.png", png.into_inner()));
        assert!(s.overlay().has_image());
        assert!(s.html_page().contains("data:image/png;base64,"));

        assert!(!s.accept_background("notes.txt", b"plain text".to_vec()));
        assert!(s.background_error().is_some());
        // the previous image stays until cleared
        assert!(s.background().is_some());

        s.clear_background();
        assert!(!s.overlay().has_image());
        assert!(s.background().is_none());
        assert_eq!(s.background_error(), None);
    }

    #[test]
    fn test_page_styles_inline_colors_like_export() {
        let mut s = session();
        let t0 = Instant::now();
        s.set_input("{FF0000}red text", t0);
        settle(&mut s, t0);

        let page = s.html_page();
        assert!(s.html_fragment().contains("hex-ff0000"));
        let color = s.stylesheet().resolve(&["hex-ff0000"]).expect("inline color");
        assert!(page.contains(&format!(".hex-ff0000 {{ color: {}; }}", color)));
    }

    #[test]
    fn test_page_styles_painted_inline_colors() {
        let mut s = session();
        let t0 = Instant::now();
        s.set_input("Alice says: Hello.", t0);
        settle(&mut s, t0);
        s.set_coloring_mode(true);
        s.handle_pointer(PointerEvent::Down {
            pos: Point::default(),
            target: Target::Word(WordId::new(0, 0)),
            modifiers: Modifiers::NONE,
        });
        assert_eq!(s.apply_color("hex-00ff00"), 1);
        assert!(s.html_page().contains(".hex-00ff00 { color: #00ff00; }"));
    }

    #[test]
    fn test_escape_and_toggle_leave_coloring_mode() {
        let mut s = session();
        let t0 = Instant::now();
        s.set_input("Alice says: Hello.", t0);
        settle(&mut s, t0);

        s.toggle_coloring_mode();
        assert!(s.palette().is_active());
        s.handle_pointer(PointerEvent::Down {
            pos: Point::default(),
            target: Target::Word(WordId::new(0, 0)),
            modifiers: Modifiers::NONE,
        });
        s.handle_key(Key::Escape);
        assert!(s.palette().selection().is_empty());

        s.toggle_coloring_mode();
        assert!(!s.palette().is_active());
    }

    #[test]
    fn test_preview_size_sets_overlay_viewport() {
        let mut s = session();
        s.set_preview_size(Size::new(640.0, 480.0));
        assert_eq!(s.overlay().viewport(), Size::new(640.0, 480.0));
    }

    #[test]
    fn test_plain_text_joins_blocks() {
        let mut s = session();
        let t0 = Instant::now();
        s.set_input("[12:00:01] one\n\ntwo", t0);
        settle(&mut s, t0);
        assert_eq!(s.plain_text(), "one\ntwo");
    }
}
