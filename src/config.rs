//! Configuration loader/writer plus strongly typed settings structures.
//!
//! `config.toml` lives in the data directory (`~/.chatlog-forge/` unless
//! `CHATLOG_FORGE_DIR` is set). Out-of-range values are replaced with their
//! defaults on load and reported through `tracing`.

use crate::background;
use crate::core::FormatOptions;
use crate::export::ExportSettings;
use crate::linebreak;
use crate::overlay::Size;
use crate::theme::{Rgba, Stylesheet};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// Embedded so a fresh data dir gets a commented config file
const DEFAULT_CONFIG: &str = include_str!("../defaults/config.toml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub formatter: FormatterConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    /// Class name -> `#rrggbb` overrides applied on top of the built-in colors
    #[serde(default)]
    pub colors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_name: Option<String>,
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    #[serde(default)]
    pub name_coloring_disabled: bool,
    #[serde(default)]
    pub censor: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            character_name: None,
            max_line_length: default_max_line_length(),
            name_coloring_disabled: false,
            censor: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_padding")]
    pub padding_x: f32,
    #[serde(default = "default_padding")]
    pub padding_y: f32,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_line_height")]
    pub line_height: f32,
    #[serde(default = "default_black_background")]
    pub black_background: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
    #[serde(default = "default_max_background_bytes")]
    pub max_background_bytes: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            dpi: default_dpi(),
            padding_x: default_padding(),
            padding_y: default_padding(),
            font_size: default_font_size(),
            line_height: default_line_height(),
            black_background: default_black_background(),
            font_path: None,
            max_background_bytes: default_max_background_bytes(),
        }
    }
}

/// Size of the preview the overlay transforms are recorded against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    #[serde(default = "default_preview_width")]
    pub width: f32,
    #[serde(default = "default_preview_height")]
    pub height: f32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: default_preview_width(),
            height: default_preview_height(),
        }
    }
}

fn default_max_line_length() -> usize {
    linebreak::DEFAULT_LINE_LENGTH
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn default_dpi() -> u32 {
    96
}

fn default_padding() -> f32 {
    10.0
}

fn default_font_size() -> f32 {
    12.0
}

fn default_line_height() -> f32 {
    1.35
}

fn default_black_background() -> bool {
    true
}

fn default_max_background_bytes() -> u64 {
    background::DEFAULT_MAX_BYTES
}

fn default_preview_width() -> f32 {
    800.0
}

fn default_preview_height() -> f32 {
    600.0
}

// Canvas dimensions beyond this are refused by most image viewers anyway
const MAX_DIMENSION: u32 = 16384;

impl Config {
    /// Get the base data directory (~/.chatlog-forge/)
    /// Can be overridden with CHATLOG_FORGE_DIR environment variable
    pub fn base_dir() -> Result<PathBuf> {
        if let Ok(custom_dir) = std::env::var("CHATLOG_FORGE_DIR") {
            return Ok(PathBuf::from(custom_dir));
        }
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".chatlog-forge"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.toml"))
    }

    pub fn store_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("store.json"))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("chatlog-forge.log"))
    }

    /// Load `config.toml` from the data dir, writing the default file first
    /// if there is none.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            Self::extract_defaults(&path)?;
        }
        Self::load_from_path(&path)
    }

    /// Load config from a custom file path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;
        let mut config: Config = toml::from_str(&contents)
            .context(format!("Failed to parse config file: {:?}", path))?;
        config.normalize();
        tracing::debug!("loaded config from {:?}", path);
        Ok(config)
    }

    fn extract_defaults(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        fs::write(path, DEFAULT_CONFIG).context("Failed to write default config.toml")?;
        tracing::info!("wrote default config to {:?}", path);
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create data directory")?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context(format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Replace invalid values with defaults. Returns how many were fixed.
    pub fn normalize(&mut self) -> usize {
        let mut fixed = 0;

        let f = &mut self.formatter;
        if f.max_line_length < linebreak::MIN_LINE_LENGTH {
            tracing::warn!(
                "formatter.max_line_length {} is below {}, using {}",
                f.max_line_length,
                linebreak::MIN_LINE_LENGTH,
                default_max_line_length()
            );
            f.max_line_length = default_max_line_length();
            fixed += 1;
        }
        if f.character_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            f.character_name = None;
        }

        let e = &mut self.export;
        fixed += fix_dimension("export.width", &mut e.width, default_width());
        fixed += fix_dimension("export.height", &mut e.height, default_height());
        if e.dpi == 0 {
            tracing::warn!("export.dpi must be positive, using {}", default_dpi());
            e.dpi = default_dpi();
            fixed += 1;
        }
        fixed += fix_positive("export.font_size", &mut e.font_size, default_font_size());
        fixed += fix_positive("export.line_height", &mut e.line_height, default_line_height());
        for (name, value) in [("export.padding_x", &mut e.padding_x), ("export.padding_y", &mut e.padding_y)] {
            if !value.is_finite() || *value < 0.0 {
                tracing::warn!("{} {} is invalid, using {}", name, value, default_padding());
                *value = default_padding();
                fixed += 1;
            }
        }
        if e.max_background_bytes == 0 {
            e.max_background_bytes = default_max_background_bytes();
            fixed += 1;
        }

        let p = &mut self.preview;
        fixed += fix_positive("preview.width", &mut p.width, default_preview_width());
        fixed += fix_positive("preview.height", &mut p.height, default_preview_height());

        self.colors.retain(|class, hex| {
            let ok = Rgba::from_hex(hex).is_some();
            if !ok {
                tracing::warn!("ignoring color override {} = {:?}: not #rrggbb", class, hex);
                fixed += 1;
            }
            ok
        });

        fixed
    }

    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            character_name: self.formatter.character_name.clone(),
            name_coloring_disabled: self.formatter.name_coloring_disabled,
            censor: self.formatter.censor,
            max_line_length: self.formatter.max_line_length,
        }
    }

    pub fn export_settings(&self) -> ExportSettings {
        let e = &self.export;
        ExportSettings {
            width: e.width,
            height: e.height,
            dpi: e.dpi,
            padding_x: e.padding_x,
            padding_y: e.padding_y,
            font_size: e.font_size,
            line_height: e.line_height,
            black_background: e.black_background,
        }
    }

    pub fn preview_size(&self) -> Size {
        Size::new(self.preview.width, self.preview.height)
    }

    /// Built-in class colors with the user's overrides applied.
    pub fn stylesheet(&self) -> Stylesheet {
        let mut sheet = Stylesheet::builtin();
        for (class, hex) in &self.colors {
            if let Some(color) = Rgba::from_hex(hex) {
                sheet.set(class, color);
            }
        }
        sheet
    }
}

fn fix_dimension(name: &str, value: &mut u32, default: u32) -> usize {
    if *value == 0 || *value > MAX_DIMENSION {
        tracing::warn!("{} {} is out of range, using {}", name, value, default);
        *value = default;
        return 1;
    }
    0
}

fn fix_positive(name: &str, value: &mut f32, default: f32) -> usize {
    if !value.is_finite() || *value <= 0.0 {
        tracing::warn!("{} {} is invalid, using {}", name, value, default);
        *value = default;
        return 1;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_embedded_defaults_match_default_impl() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG).expect("embedded config parses");
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.formatter.max_line_length, 77);
        assert_eq!(config.export.width, 800);
        assert_eq!(config.export.height, 600);
        assert_eq!(config.export.dpi, 96);
        assert_eq!(config.export.font_size, 12.0);
        assert!(config.export.black_background);
        assert!(!config.formatter.censor);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str("[formatter]\ncharacter_name = \"Alice\"\n").expect("parse");
        assert_eq!(config.formatter.character_name.as_deref(), Some("Alice"));
        assert_eq!(config.formatter.max_line_length, 77);
        assert_eq!(config.export, ExportConfig::default());
    }

    #[test]
    fn test_normalize_replaces_invalid_values() {
        let mut config = Config::default();
        config.formatter.max_line_length = 3;
        config.export.width = 0;
        config.export.font_size = -1.0;
        config.export.padding_x = f32::NAN;
        config.colors.insert("whisper".into(), "purple".into());
        config.colors.insert("speech".into(), "#c0c0c0".into());

        assert_eq!(config.normalize(), 5);
        assert_eq!(config.formatter.max_line_length, 77);
        assert_eq!(config.export.width, 800);
        assert_eq!(config.export.font_size, 12.0);
        assert_eq!(config.export.padding_x, 10.0);
        assert_eq!(config.colors.len(), 1);
    }

    #[test]
    fn test_blank_character_name_is_none() {
        let mut config = Config::default();
        config.formatter.character_name = Some("  ".into());
        config.normalize();
        assert_eq!(config.formatter.character_name, None);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.formatter.character_name = Some("Bob".into());
        config.formatter.censor = true;
        config.export.dpi = 300;
        config.colors.insert("whisper".into(), "#c080ff".into());
        config.save_to(&path).expect("save");

        let loaded = Config::load_from_path(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[export\nwidth = ").expect("write");
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_stylesheet_applies_overrides() {
        let mut config = Config::default();
        config.colors.insert("whisper".into(), "#010203".into());
        let sheet = config.stylesheet();
        assert_eq!(sheet.class_color("whisper"), Some(Rgba::rgb(1, 2, 3)));
    }

    #[test]
    fn test_settings_conversions() {
        let mut config = Config::default();
        config.formatter.character_name = Some("Alice".into());
        config.formatter.max_line_length = 40;
        let opts = config.format_options();
        assert_eq!(opts.character_name.as_deref(), Some("Alice"));
        assert_eq!(opts.max_line_length, 40);
        assert_eq!(config.export_settings(), ExportSettings::default());
        assert_eq!(config.preview_size(), Size::new(800.0, 600.0));
    }
}
