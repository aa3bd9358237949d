//! Word selection and the interactive color palette.

use crate::dom::{Document, WordId};
use crate::events::{Key, Modifiers, Point, PointerEvent, Target};
use crate::theme::Stylesheet;
use std::collections::BTreeSet;

/// Pointer travel (preview pixels) that turns a press into a drag.
pub const DRAG_THRESHOLD_PX: f32 = 4.0;

/// Set of selected words, kept in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    words: BTreeSet<WordId>,
}

impl Selection {
    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Replace the selection with a single word.
    pub fn select_only(&mut self, id: WordId) {
        self.words.clear();
        self.words.insert(id);
    }

    pub fn toggle(&mut self, id: WordId) {
        if !self.words.remove(&id) {
            self.words.insert(id);
        }
    }

    /// Select every word of `doc` between `a` and `b` inclusive, in either
    /// direction, on top of `base`.
    pub fn set_range(&mut self, doc: &Document, a: WordId, b: WordId, base: &BTreeSet<WordId>) {
        let (start, end) = normalized_range(a, b);
        self.words = base.clone();
        self.words
            .extend(doc.word_ids().into_iter().filter(|id| *id >= start && *id <= end));
    }

    pub fn contains(&self, id: WordId) -> bool {
        self.words.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = WordId> + '_ {
        self.words.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Get the normalized range (start before end)
pub fn normalized_range(a: WordId, b: WordId) -> (WordId, WordId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Debug, Clone)]
struct DragState {
    anchor: WordId,
    origin: Point,
    dragging: bool,
    /// Selection at press time; a ctrl-drag extends it
    base: BTreeSet<WordId>,
}

/// Coloring-mode state machine.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    active: bool,
    palette_visible: bool,
    native_selection: bool,
    selection: Selection,
    drag: Option<DragState>,
    pub drag_threshold_px: f32,
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            active: false,
            palette_visible: false,
            native_selection: true,
            selection: Selection::default(),
            drag: None,
            drag_threshold_px: DRAG_THRESHOLD_PX,
        }
    }
}

impl ColorPalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_palette_visible(&self) -> bool {
        self.palette_visible
    }

    /// Whether the frontend should allow native text selection.
    pub fn native_selection_enabled(&self) -> bool {
        self.native_selection
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.as_ref().is_some_and(|d| d.dragging)
    }

    pub fn set_active(&mut self, on: bool) {
        if on == self.active {
            return;
        }
        self.active = on;
        self.selection.clear();
        self.drag = None;
        self.palette_visible = on;
        self.native_selection = !on;
        tracing::debug!("coloring mode {}", if on { "on" } else { "off" });
    }

    pub fn toggle(&mut self) {
        self.set_active(!self.active);
    }

    /// Drop the selection, e.g. after the document was rebuilt.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.drag = None;
    }

    /// Feed a pointer event; ignored unless coloring mode is on.
    pub fn handle_pointer(&mut self, event: PointerEvent, doc: &Document) {
        if !self.active {
            return;
        }

        match event {
            PointerEvent::Down {
                pos,
                target,
                modifiers,
            } => self.pointer_down(pos, target, modifiers),
            PointerEvent::Move { pos, target } => self.pointer_move(pos, target, doc),
            PointerEvent::Up { .. } | PointerEvent::Leave => self.drag = None,
            PointerEvent::Wheel { .. } => {}
        }
    }

    fn pointer_down(&mut self, pos: Point, target: Target, modifiers: Modifiers) {
        match target {
            Target::Word(id) => {
                let base = if modifiers.ctrl {
                    self.selection.words.clone()
                } else {
                    BTreeSet::new()
                };
                if modifiers.ctrl {
                    self.selection.toggle(id);
                } else {
                    self.selection.select_only(id);
                }
                self.drag = Some(DragState {
                    anchor: id,
                    origin: pos,
                    dragging: false,
                    base,
                });
            }
            Target::Palette => {}
            Target::Chat | Target::Image | Target::Outside => {
                self.selection.clear();
                self.drag = None;
            }
        }
    }

    fn pointer_move(&mut self, pos: Point, target: Target, doc: &Document) {
        let threshold = self.drag_threshold_px;
        let Some(drag) = self.drag.as_mut() else {
            return;
        };
        if !drag.dragging && drag.origin.distance(pos) > threshold {
            drag.dragging = true;
        }
        if !drag.dragging {
            return;
        }
        if let Target::Word(current) = target {
            self.selection.set_range(doc, drag.anchor, current, &drag.base);
        }
    }

    pub fn handle_key(&mut self, key: Key) {
        if !self.active {
            return;
        }
        match key {
            Key::Escape => {
                self.selection.clear();
                self.drag = None;
            }
        }
    }

    /// Recolor every selected word. Returns how many words changed.
    pub fn apply_color(&self, class: &str, doc: &mut Document, stylesheet: &Stylesheet) -> usize {
        if !self.active || !stylesheet.is_color_class(class) {
            return 0;
        }
        self.selection
            .iter()
            .filter(|id| doc.recolor(*id, class, stylesheet))
            .count()
    }
}
