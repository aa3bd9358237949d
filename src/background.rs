//! Background image upload: validation, decoding and the drop-zone state.

use crate::overlay::Size;
use base64::{engine::general_purpose, Engine as _};
use std::path::Path;

/// Default upload limit (10 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// MIME types accepted as backgrounds, sniffed from magic bytes.
pub const SUPPORTED_MIMES: &[&str] = &["image/png", "image/jpeg", "image/webp"];

#[derive(Debug, thiserror::Error)]
pub enum BackgroundError {
    #[error("image is too large ({size} bytes, limit is {max} bytes)")]
    TooLarge { size: u64, max: u64 },
    #[error("unsupported image type '{0}' (use PNG, JPEG or WebP)")]
    Unsupported(String),
    #[error("file is not a recognized image")]
    Unrecognized,
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A decoded background image.
#[derive(Debug, Clone)]
pub struct Background {
    pub name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
    pub image: image::RgbaImage,
}

impl Background {
    pub fn natural_size(&self) -> Size {
        Size::new(self.image.width() as f32, self.image.height() as f32)
    }

    /// `data:` URL for embedding in the HTML page.
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Check size and sniffed type. `declared_len` is the size reported before
/// reading (file metadata); the larger of it and the actual length counts.
pub fn validate(bytes: &[u8], declared_len: u64, max_bytes: u64) -> Result<&'static str, BackgroundError> {
    let size = declared_len.max(bytes.len() as u64);
    if size > max_bytes {
        return Err(BackgroundError::TooLarge {
            size,
            max: max_bytes,
        });
    }

    let kind = infer::get(bytes).ok_or(BackgroundError::Unrecognized)?;
    let mime = kind.mime_type();
    SUPPORTED_MIMES
        .iter()
        .find(|m| **m == mime)
        .copied()
        .ok_or_else(|| BackgroundError::Unsupported(mime.to_string()))
}

/// Validate then decode.
pub fn decode(name: &str, bytes: Vec<u8>, declared_len: u64, max_bytes: u64) -> Result<Background, BackgroundError> {
    let mime = validate(&bytes, declared_len, max_bytes)?;
    let image = image::load_from_memory(&bytes)?.to_rgba8();
    tracing::debug!(
        "decoded background '{}' ({}, {}x{})",
        name,
        mime,
        image.width(),
        image.height()
    );
    Ok(Background {
        name: name.to_string(),
        mime,
        bytes,
        image,
    })
}

/// Load a background from disk, refusing oversized files before reading them.
pub fn load(path: &Path, max_bytes: u64) -> Result<Background, BackgroundError> {
    let io_err = |source| BackgroundError::Io {
        path: path.display().to_string(),
        source,
    };
    let declared = std::fs::metadata(path).map_err(io_err)?.len();
    if declared > max_bytes {
        return Err(BackgroundError::TooLarge {
            size: declared,
            max: max_bytes,
        });
    }
    let bytes = std::fs::read(path).map_err(io_err)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    decode(&name, bytes, declared, max_bytes)
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropZoneState {
    Idle { error: Option<String> },
    Loading { name: String },
    Loaded { name: String, size: Size },
}

/// Upload widget state: `Idle -> Loading -> Loaded | Idle(error)`.
#[derive(Debug, Clone)]
pub struct DropZone {
    state: DropZoneState,
    pub max_bytes: u64,
}

impl Default for DropZone {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

impl DropZone {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            state: DropZoneState::Idle { error: None },
            max_bytes,
        }
    }

    pub fn state(&self) -> &DropZoneState {
        &self.state
    }

    pub fn begin(&mut self, name: &str) {
        self.state = DropZoneState::Loading {
            name: name.to_string(),
        };
    }

    /// Settle a load. Failures return to idle with the message kept for display.
    pub fn finish(&mut self, result: Result<Background, BackgroundError>) -> Option<Background> {
        match result {
            Ok(bg) => {
                self.state = DropZoneState::Loaded {
                    name: bg.name.clone(),
                    size: bg.natural_size(),
                };
                Some(bg)
            }
            Err(e) => {
                tracing::warn!("background rejected: {}", e);
                self.state = DropZoneState::Idle {
                    error: Some(e.to_string()),
                };
                None
            }
        }
    }

    /// Handle a dropped or picked file.
    pub fn accept(&mut self, name: &str, bytes: Vec<u8>) -> Option<Background> {
        self.begin(name);
        let len = bytes.len() as u64;
        let result = decode(name, bytes, len, self.max_bytes);
        self.finish(result)
    }

    pub fn clear(&mut self) {
        self.state = DropZoneState::Idle { error: None };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn test_validate_png() {
        let png = tiny_png();
        assert_eq!(validate(&png, 0, DEFAULT_MAX_BYTES).expect("valid"), "image/png");
    }

    #[test]
    fn test_validate_rejects_oversized_by_declared_len() {
        let png = tiny_png();
        let err = validate(&png, DEFAULT_MAX_BYTES + 1, DEFAULT_MAX_BYTES).unwrap_err();
        assert!(matches!(err, BackgroundError::TooLarge { .. }));
    }

    #[test]
    fn test_validate_rejects_gif_and_text() {
        let gif = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;".to_vec();
        assert!(matches!(
            validate(&gif, 0, DEFAULT_MAX_BYTES),
            Err(BackgroundError::Unsupported(m)) if m == "image/gif"
        ));
        assert!(matches!(
            validate(b"hello", 0, DEFAULT_MAX_BYTES),
            Err(BackgroundError::Unrecognized)
        ));
    }

    #[test]
    fn test_decode_sets_size_and_data_url() {
        let bg = decode("bg.png", tiny_png(), 0, DEFAULT_MAX_BYTES).expect("decode");
        assert_eq!(bg.natural_size(), Size::new(4.0, 2.0));
        assert!(bg.data_url().starts_with("data:image/png;base64,iVBOR"));
    }

    #[test]
    fn test_drop_zone_success_and_failure() {
        let mut zone = DropZone::default();
        assert!(zone.accept("bg.png", tiny_png()).is_some());
        assert!(matches!(zone.state(), DropZoneState::Loaded { name, .. } if name == "bg.png"));

        // truncated png: sniffs fine, fails to decode
        let mut broken = tiny_png();
        broken.truncate(20);
        assert!(zone.accept("broken.png", broken).is_none());
        assert!(matches!(zone.state(), DropZoneState::Idle { error: Some(_) }));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bg.png");
        std::fs::write(&path, tiny_png()).expect("write");
        let bg = load(&path, DEFAULT_MAX_BYTES).expect("load");
        assert_eq!(bg.name, "bg.png");
        assert!(matches!(load(&path, 10), Err(BackgroundError::TooLarge { .. })));
    }
}
