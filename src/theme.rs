//! Chat color classes and the stylesheet that resolves them.
//!
//! The stylesheet plays the role of the browser's computed style: the export
//! renderer never re-derives colors from the input, it asks the stylesheet
//! which color a rendered span's classes resolve to.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::rgb(r, g, b))
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Prefix of classes produced from inline `{RRGGBB}` codes.
pub const HEX_CLASS_PREFIX: &str = "hex-";

/// Built-in chat color classes, in palette order.
pub const BUILTIN_CLASSES: &[(&str, &str)] = &[
    ("white", "#ffffff"),
    ("lightgrey", "#c8c8c8"),
    ("grey", "#939393"),
    ("darkgrey", "#6e6e6e"),
    ("me", "#c2a2da"),
    ("ame", "#c2a2da"),
    ("whisper", "#ede58f"),
    ("carwhisper", "#d7df01"),
    ("yellow", "#fbf969"),
    ("radio", "#8d8dff"),
    ("radio2", "#6d6dbf"),
    ("dep", "#ff8282"),
    ("blue", "#2eb1d1"),
    ("green", "#33aa33"),
    ("orange", "#ff9900"),
    ("death", "#ff5555"),
    ("pm", "#eee854"),
    ("ooc", "#a4a4a4"),
    ("vessel", "#00ff5e"),
    ("intercom", "#1f8dd6"),
];

/// Resolves class lists to colors and emits the matching CSS.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    colors: HashMap<String, Rgba>,
    /// Color used when no class resolves
    pub default_color: Rgba,
}

impl Default for Stylesheet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Stylesheet {
    pub fn builtin() -> Self {
        let colors = BUILTIN_CLASSES
            .iter()
            .filter_map(|(name, hex)| Rgba::from_hex(hex).map(|c| (name.to_string(), c)))
            .collect();
        Self {
            colors,
            default_color: Rgba::WHITE,
        }
    }

    /// Override or add a class color (from the user's config).
    pub fn set(&mut self, class: &str, color: Rgba) {
        self.colors.insert(class.to_string(), color);
    }

    /// Color of a single class, including `hex-rrggbb` classes.
    pub fn class_color(&self, class: &str) -> Option<Rgba> {
        if let Some(hex) = class.strip_prefix(HEX_CLASS_PREFIX) {
            return Rgba::from_hex(hex);
        }
        self.colors.get(class).copied()
    }

    /// First class that resolves wins; marker classes never resolve.
    pub fn resolve<S: AsRef<str>>(&self, classes: &[S]) -> Option<Rgba> {
        classes.iter().find_map(|c| self.class_color(c.as_ref()))
    }

    pub fn is_color_class(&self, class: &str) -> bool {
        self.class_color(class).is_some()
    }

    /// Palette entries offered to the user, in display order.
    pub fn palette(&self) -> Vec<(&str, Rgba)> {
        BUILTIN_CLASSES
            .iter()
            .filter_map(|(name, _)| self.colors.get(*name).map(|c| (*name, *c)))
            .collect()
    }

    /// CSS rules for every known class plus the marker classes. Inline color
    /// classes have no fixed entry, so the ones in `used` get a rule each.
    pub fn to_css<'a>(
        &self,
        font_size_px: u32,
        line_height: f32,
        used: impl IntoIterator<Item = &'a str>,
    ) -> String {
        let mut names: Vec<&String> = self.colors.keys().collect();
        names.sort();

        let mut css = format!(
            ".generated {{ font-family: Arial, Helvetica, sans-serif; font-weight: bold; \
             font-size: {}px; line-height: {:.2}; color: {}; \
             text-shadow: -1px -1px 0 #000, 1px -1px 0 #000, -1px 1px 0 #000, 1px 1px 0 #000; }}\n",
            font_size_px, line_height, self.default_color
        );
        for name in names {
            css.push_str(&format!(".{} {{ color: {}; }}\n", name, self.colors[name]));
        }
        for class in used.into_iter().filter(|c| c.starts_with(HEX_CLASS_PREFIX)) {
            if let Some(color) = self.class_color(class) {
                css.push_str(&format!(".{} {{ color: {}; }}\n", class, color));
            }
        }
        css.push_str(".hidden { visibility: hidden; }\n");
        css.push_str(".colorable { cursor: pointer; }\n");
        css
    }
}
