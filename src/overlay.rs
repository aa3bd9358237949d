//! Pan/zoom transforms for the background image and the chat block.
//!
//! Transforms live in preview pixel space. The export renderer rescales the
//! offsets to the export canvas; scale factors carry over unchanged.

use crate::events::{Point, PointerEvent, Target};
use serde::{Deserialize, Serialize};

/// Part of an element that must stay inside the preview while panning.
pub const MIN_VISIBLE_PX: f32 = 40.0;
/// Relative zoom change per wheel notch.
pub const ZOOM_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleRange {
    pub min: f32,
    pub max: f32,
}

impl ScaleRange {
    pub fn clamp(&self, scale: f32) -> f32 {
        if scale.is_finite() {
            scale.clamp(self.min, self.max)
        } else {
            1.0_f32.clamp(self.min, self.max)
        }
    }
}

pub const IMAGE_SCALE: ScaleRange = ScaleRange { min: 0.1, max: 5.0 };
pub const CHAT_SCALE: ScaleRange = ScaleRange {
    min: 0.25,
    max: 4.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub w: f32,
    pub h: f32,
}

impl Size {
    pub fn new(w: f32, h: f32) -> Self {
        Self { w, h }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }
}

/// Object-fit "contain": the largest rect with the content's aspect ratio
/// that fits `container`, centered in it.
pub fn contain_rect(content: Size, container: Rect) -> Rect {
    if content.w <= 0.0 || content.h <= 0.0 {
        return Rect::new(container.x, container.y, 0.0, 0.0);
    }
    let ratio = (container.w / content.w).min(container.h / content.h);
    let w = content.w * ratio;
    let h = content.h * ratio;
    Rect::new(
        container.x + (container.w - w) / 2.0,
        container.y + (container.h - h) / 2.0,
        w,
        h,
    )
}

/// Allowed offset range for one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl PanBounds {
    /// Bounds for an element whose scaled, un-offset rect is `element`.
    pub fn new(viewport: Size, element: Rect) -> Self {
        let (min_x, max_x) = axis_bounds(viewport.w, element.x, element.w);
        let (min_y, max_y) = axis_bounds(viewport.h, element.y, element.h);
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }
}

fn axis_bounds(viewport: f32, start: f32, len: f32) -> (f32, f32) {
    let visible = MIN_VISIBLE_PX.min(len.max(0.0));
    let min = visible - (start + len);
    let max = viewport - visible - start;
    if min <= max {
        (min, max)
    } else {
        let mid = (min + max) / 2.0;
        (mid, mid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageTransform {
    pub offset_x: f32,
    pub offset_y: f32,
    pub scale: f32,
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: 1.0,
        }
    }
}

impl ImageTransform {
    pub fn new(offset_x: f32, offset_y: f32, scale: f32) -> Self {
        Self {
            offset_x,
            offset_y,
            scale,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    /// Zoom by `factor` keeping the content under `pointer` fixed. `pivot` is
    /// the point the element scales about.
    pub fn zoom_by(&mut self, factor: f32, pointer: Point, pivot: Point, range: ScaleRange) {
        let old = self.scale;
        let new = range.clamp(old * factor);
        if (new - old).abs() < f32::EPSILON || old == 0.0 {
            return;
        }
        let k = new / old;
        let px = pointer.x - pivot.x;
        let py = pointer.y - pivot.y;
        self.offset_x = px - (px - self.offset_x) * k;
        self.offset_y = py - (py - self.offset_y) * k;
        self.scale = new;
    }

    pub fn clamp(&mut self, bounds: PanBounds) {
        self.offset_x = self.offset_x.clamp(bounds.min_x, bounds.max_x);
        self.offset_y = self.offset_y.clamp(bounds.min_y, bounds.max_y);
    }

    /// `base` scaled about `pivot`, before the offset is applied.
    pub fn scaled_rect(&self, base: Rect, pivot: Point) -> Rect {
        Rect::new(
            pivot.x + (base.x - pivot.x) * self.scale,
            pivot.y + (base.y - pivot.y) * self.scale,
            base.w * self.scale,
            base.h * self.scale,
        )
    }

    /// Final on-screen rect.
    pub fn apply(&self, base: Rect, pivot: Point) -> Rect {
        let r = self.scaled_rect(base, pivot);
        Rect::new(r.x + self.offset_x, r.y + self.offset_y, r.w, r.h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Image,
    Chat,
}

#[derive(Debug, Clone, Copy)]
struct PanDrag {
    layer: Layer,
    last: Point,
}

/// Routes pointer input to the image or chat transform.
#[derive(Debug, Clone)]
pub struct OverlayController {
    pub image: ImageTransform,
    pub chat: ImageTransform,
    viewport: Size,
    image_size: Option<Size>,
    chat_origin: Point,
    chat_size: Size,
    drag: Option<PanDrag>,
}

impl OverlayController {
    pub fn new(viewport: Size, chat_origin: Point) -> Self {
        Self {
            image: ImageTransform::default(),
            chat: ImageTransform::default(),
            viewport,
            image_size: None,
            chat_origin,
            chat_size: Size::default(),
            drag: None,
        }
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    /// A resized preview invalidates both transforms.
    pub fn set_viewport(&mut self, viewport: Size) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.reset();
        }
    }

    pub fn set_image(&mut self, natural: Option<Size>) {
        self.image_size = natural;
        self.image.reset();
    }

    pub fn has_image(&self) -> bool {
        self.image_size.is_some()
    }

    pub fn set_chat_size(&mut self, size: Size) {
        self.chat_size = size;
    }

    /// Where the untransformed chat block starts (the export padding).
    pub fn set_chat_origin(&mut self, origin: Point) {
        self.chat_origin = origin;
    }

    pub fn reset(&mut self) {
        self.image.reset();
        self.chat.reset();
        self.drag = None;
    }

    pub fn is_panning(&self) -> bool {
        self.drag.is_some()
    }

    fn viewport_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.viewport.w, self.viewport.h)
    }

    /// Contained rect of the background image, before its transform.
    pub fn image_base(&self) -> Option<Rect> {
        self.image_size
            .map(|size| contain_rect(size, self.viewport_rect()))
    }

    pub fn chat_base(&self) -> Rect {
        Rect::new(
            self.chat_origin.x,
            self.chat_origin.y,
            self.chat_size.w,
            self.chat_size.h,
        )
    }

    fn image_pivot(&self) -> Point {
        self.viewport_rect().center()
    }

    fn clamp_layer(&mut self, layer: Layer) {
        match layer {
            Layer::Image => {
                if let Some(base) = self.image_base() {
                    let pivot = self.image_pivot();
                    let bounds = PanBounds::new(self.viewport, self.image.scaled_rect(base, pivot));
                    self.image.clamp(bounds);
                }
            }
            Layer::Chat => {
                let base = self.chat_base();
                let bounds = PanBounds::new(self.viewport, self.chat.scaled_rect(base, self.chat_origin));
                self.chat.clamp(bounds);
            }
        }
    }

    /// Pull both transforms back inside their pan bounds, for offsets set
    /// directly instead of by dragging.
    pub fn clamp_all(&mut self) {
        self.clamp_layer(Layer::Image);
        self.clamp_layer(Layer::Chat);
    }

    fn layer_for(&self, target: Target) -> Option<Layer> {
        match target {
            Target::Image if self.has_image() => Some(Layer::Image),
            Target::Chat | Target::Word(_) => Some(Layer::Chat),
            _ => None,
        }
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down { pos, target, .. } => {
                self.drag = self.layer_for(target).map(|layer| PanDrag { layer, last: pos });
            }
            PointerEvent::Move { pos, .. } => {
                let Some(drag) = self.drag.as_mut() else {
                    return;
                };
                let (dx, dy) = (pos.x - drag.last.x, pos.y - drag.last.y);
                drag.last = pos;
                let layer = drag.layer;
                match layer {
                    Layer::Image => self.image.pan_by(dx, dy),
                    Layer::Chat => self.chat.pan_by(dx, dy),
                }
                self.clamp_layer(layer);
            }
            PointerEvent::Up { .. } | PointerEvent::Leave => self.drag = None,
            PointerEvent::Wheel {
                pos,
                target,
                delta_y,
            } => {
                if delta_y == 0.0 {
                    return;
                }
                let factor = if delta_y < 0.0 {
                    1.0 + ZOOM_STEP
                } else {
                    1.0 - ZOOM_STEP
                };
                match self.layer_for(target) {
                    Some(Layer::Image) => {
                        let pivot = self.image_pivot();
                        self.image.zoom_by(factor, pos, pivot, IMAGE_SCALE);
                        self.clamp_layer(Layer::Image);
                    }
                    Some(Layer::Chat) => {
                        let pivot = self.chat_origin;
                        self.chat.zoom_by(factor, pos, pivot, CHAT_SCALE);
                        self.clamp_layer(Layer::Chat);
                    }
                    None => {}
                }
            }
        }
    }
}
