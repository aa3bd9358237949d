//! Frontend-agnostic input events.
//!
//! A frontend hit-tests its own widgets and reports what is under the
//! pointer as a [`Target`]; the state machines in `selection` and `overlay`
//! only ever see these events.

use crate::dom::WordId;

/// Pointer position in preview pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Ctrl on Linux/Windows, Cmd on macOS
    pub ctrl: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
    };
    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        shift: false,
    };
}

/// What the pointer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Word(WordId),
    /// The palette swatches themselves
    Palette,
    /// Inside the chat output but not on a word
    Chat,
    /// The background image layer
    Image,
    Outside,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down {
        pos: Point,
        target: Target,
        modifiers: Modifiers,
    },
    Move {
        pos: Point,
        target: Target,
    },
    Up {
        pos: Point,
    },
    Leave,
    Wheel {
        pos: Point,
        target: Target,
        /// Positive scrolls down (zoom out)
        delta_y: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
}
